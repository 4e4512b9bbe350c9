//! Notification dispatcher trait and implementations.
//!
//! Dispatch is best effort: callers hand a message to
//! [`spawn_owner_notification`] and move on. Failures are logged and counted,
//! never surfaced and never retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{Order, User};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use store::UserStore;
use thiserror::Error;
use tokio::sync::RwLock;

/// An outbound message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub plain_text: String,
    pub html: String,
}

impl Notification {
    /// Confirmation for an order that will be paid on delivery.
    pub fn order_placed(order: &Order, user: &User) -> Self {
        Self::summary(
            order,
            user,
            "Order Confirmation - Cash on Delivery",
            "Your order has been placed and will be paid on delivery.",
        )
    }

    /// Receipt for an order whose gateway payment was verified.
    pub fn payment_confirmed(order: &Order, user: &User) -> Self {
        Self::summary(
            order,
            user,
            "Order Confirmation - Payment Successful",
            "Your payment has been successfully verified.",
        )
    }

    fn summary(order: &Order, user: &User, subject: &str, headline: &str) -> Self {
        let lines: Vec<String> = order
            .items
            .iter()
            .map(|line| format!("{} x{} @ {}", line.name, line.quantity, line.unit_price))
            .collect();

        let plain_text = format!(
            "Hi {name},\n{headline}\nOrder ID: {id}\nPayment method: {method}\n{lines}\nSubtotal: {items}\nShipping: {shipping}\nTotal: {total}\n",
            name = user.name,
            id = order.id,
            method = order.payment_info.method,
            lines = lines.join("\n"),
            items = order.items_price,
            shipping = order.shipping_price,
            total = order.total_price,
        );
        let html = format!(
            "<p>Hi {name},</p><p>{headline}</p><p>Order ID: {id}</p><ul>{lines}</ul><p>Total: {total}</p>",
            name = user.name,
            id = order.id,
            lines = lines
                .iter()
                .map(|line| format!("<li>{line}</li>"))
                .collect::<String>(),
            total = order.total_price,
        );

        Self {
            recipient: user.email.clone(),
            subject: subject.to_string(),
            plain_text,
            html,
        }
    }
}

/// Errors reported by a notification transport.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Notification timed out after {0:?}")]
    TimedOut(Duration),
}

/// Trait for delivering notifications.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync + 'static {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[async_trait]
impl<T: NotificationDispatcher + ?Sized> NotificationDispatcher for Arc<T> {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
        (**self).dispatch(notification).await
    }
}

/// Looks up the order owner and dispatches a notification in the background.
///
/// The returned handle is only useful to tests; production callers drop it.
pub fn spawn_owner_notification<U, N>(
    users: U,
    notifier: N,
    order: Order,
    build: fn(&Order, &User) -> Notification,
    timeout: Duration,
) -> tokio::task::JoinHandle<()>
where
    U: UserStore + Clone + 'static,
    N: NotificationDispatcher + Clone,
{
    tokio::spawn(async move {
        let user = match users.get_user(order.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(order_id = %order.id, "notification skipped: order owner not found");
                return;
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "notification skipped: owner lookup failed");
                return;
            }
        };

        let notification = build(&order, &user);
        let outcome = match tokio::time::timeout(timeout, notifier.dispatch(notification)).await {
            Ok(result) => result,
            Err(_) => Err(NotificationError::TimedOut(timeout)),
        };

        match outcome {
            Ok(()) => tracing::info!(order_id = %order.id, "notification sent"),
            Err(e) => {
                metrics::counter!("notifications_failed_total").increment(1);
                tracing::error!(order_id = %order.id, error = %e, "failed to send notification");
            }
        }
    })
}

/// Dispatcher that only writes the notification to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LogNotificationDispatcher {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
        tracing::info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "notification (log only)"
        );
        Ok(())
    }
}

/// SMTP connection settings.
#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_name: String,
    pub from_email: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from_name", &self.from_name)
            .field("from_email", &self.from_email)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Dispatcher sending mail through an SMTP relay.
#[derive(Clone)]
pub struct SmtpNotificationDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotificationDispatcher {
    /// Builds the transport. Port 465 uses implicit TLS, anything else STARTTLS.
    pub fn new(settings: SmtpSettings) -> Result<Self, NotificationError> {
        let from: Mailbox = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse()
            .map_err(|e: lettre::address::AddressError| {
                NotificationError::InvalidAddress(e.to_string())
            })?;

        let builder = if settings.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        }
        .map_err(|e| NotificationError::Transport(format!("SMTP relay error: {e}")))?;

        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(settings.username, settings.password))
            .timeout(Some(settings.timeout))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl NotificationDispatcher for SmtpNotificationDispatcher {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
        let to: Mailbox = notification
            .recipient
            .parse()
            .map_err(|e: lettre::address::AddressError| {
                NotificationError::InvalidAddress(e.to_string())
            })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject)
            .multipart(MultiPart::alternative_plain_html(
                notification.plain_text,
                notification.html,
            ))
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    sent: Vec<Notification>,
    fail_on_dispatch: bool,
}

/// In-memory dispatcher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationDispatcher {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the dispatcher to fail every dispatch.
    pub async fn set_fail_on_dispatch(&self, fail: bool) {
        self.state.write().await.fail_on_dispatch = fail;
    }

    /// Returns every notification delivered so far.
    pub async fn sent(&self) -> Vec<Notification> {
        self.state.read().await.sent.clone()
    }

    /// Waits until at least `count` notifications were delivered.
    ///
    /// Returns false if `within` elapses first.
    pub async fn wait_for(&self, count: usize, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if self.state.read().await.sent.len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl NotificationDispatcher for InMemoryNotificationDispatcher {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
        let mut state = self.state.write().await;
        if state.fail_on_dispatch {
            return Err(NotificationError::Transport("mailbox unavailable".to_string()));
        }
        state.sent.push(notification);
        Ok(())
    }
}
