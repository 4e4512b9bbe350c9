//! Value objects for the order domain.

use common::ProductId;
use serde::{Deserialize, Serialize};

use super::state::{PaymentMethod, PaymentStatus};
use crate::error::DomainError;

/// Money amount held in paisa (1/100 rupee) to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    paisa: i64,
}

impl Money {
    /// Creates a new Money amount from paisa.
    pub fn from_paisa(paisa: i64) -> Self {
        Self { paisa }
    }

    /// Creates a new Money amount from whole rupees.
    pub fn from_rupees(rupees: i64) -> Self {
        Self {
            paisa: rupees.saturating_mul(100),
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { paisa: 0 }
    }

    /// Returns the amount in paisa.
    pub fn paisa(&self) -> i64 {
        self.paisa
    }

    /// Returns the rupee portion (whole number, truncated).
    pub fn rupees(&self) -> i64 {
        self.paisa / 100
    }

    /// Returns the paisa portion (remainder after rupees).
    pub fn paisa_part(&self) -> i64 {
        self.paisa.abs() % 100
    }

    /// Rounds to whole rupees, halves rounding up.
    ///
    /// This is the amount format the payment gateway signs.
    pub fn rounded_rupees(&self) -> i64 {
        self.paisa.saturating_add(50).div_euclid(100)
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.paisa < 0
    }

    /// Multiplies by a quantity, saturating at the `i64` bounds.
    ///
    /// Display totals only; order pricing goes through
    /// [`Money::checked_multiply`].
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            paisa: self.paisa.saturating_mul(i64::from(quantity)),
        }
    }

    /// Multiplies by a quantity, failing instead of overflowing.
    pub fn checked_multiply(&self, quantity: u32) -> Result<Money, DomainError> {
        self.paisa
            .checked_mul(i64::from(quantity))
            .map(Money::from_paisa)
            .ok_or(DomainError::AmountOverflow)
    }

    /// Adds two amounts, failing instead of overflowing.
    pub fn checked_add(self, rhs: Money) -> Result<Money, DomainError> {
        self.paisa
            .checked_add(rhs.paisa)
            .map(Money::from_paisa)
            .ok_or(DomainError::AmountOverflow)
    }

    /// Rejects negative amounts.
    pub fn non_negative(self) -> Result<Money, DomainError> {
        if self.is_negative() {
            return Err(DomainError::NegativeAmount { paisa: self.paisa });
        }
        Ok(self)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.paisa < 0 {
            write!(f, "-NRS {}.{:02}", self.rupees().abs(), self.paisa_part())
        } else {
            write!(f, "NRS {}.{:02}", self.rupees(), self.paisa_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            paisa: self.paisa.saturating_add(rhs.paisa),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.paisa = self.paisa.saturating_add(rhs.paisa);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// Delivery address captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub address: String,
    pub city: String,
    pub phone_no: String,
}

impl ShippingInfo {
    pub fn new(
        address: impl Into<String>,
        city: impl Into<String>,
        phone_no: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            city: city.into(),
            phone_no: phone_no.into(),
        }
    }

    /// Checks that every field is present.
    pub fn validate(&self) -> Result<(), DomainError> {
        let fields = [
            ("address", &self.address),
            ("city", &self.city),
            ("phoneNo", &self.phone_no),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(DomainError::MissingShippingField { field });
            }
        }
        Ok(())
    }
}

/// A product snapshot frozen into an order at settlement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Product name at settlement time.
    pub name: String,

    /// Price per unit at settlement time.
    pub unit_price: Money,

    /// Quantity ordered.
    pub quantity: u32,

    /// Product image reference at settlement time.
    pub image: String,
}

impl OrderLineItem {
    /// Returns the total price for this line (quantity * unit_price).
    pub fn line_total(&self) -> Result<Money, DomainError> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

/// Payment sub-record of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    /// Reference assigned by the gateway once the payment is confirmed.
    pub transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
}

impl PaymentInfo {
    /// A fresh, unpaid record for the given method.
    pub fn pending(method: PaymentMethod) -> Self {
        Self {
            transaction_id: None,
            status: PaymentStatus::Pending,
            method,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status == PaymentStatus::Succeeded
    }
}
