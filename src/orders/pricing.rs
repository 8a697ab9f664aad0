//! Menu validation and order totals
//!
//! Every line item is checked against the restaurant's current menu, the raw
//! subtotal is checked against the restaurant minimum, then an optional
//! coupon is applied:
//!
//! ```text
//! total = subtotal - discount + tip + tax + delivery_charge
//! ```

use crate::core::error::{CourierError, FieldValidationError, ValidationError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A priced option of a food item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variation {
    pub id: String,
    pub title: String,
    pub price: Decimal,
    /// Sale price; used instead of `price` when set and positive
    #[serde(default)]
    pub discounted: Option<Decimal>,
    #[serde(default)]
    pub out_of_stock: bool,
}

impl Variation {
    pub fn unit_price(&self) -> Decimal {
        match self.discounted {
            Some(d) if d > Decimal::ZERO => d,
            _ => self.price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Food {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub out_of_stock: bool,
    pub variations: Vec<Variation>,
}

/// The parts of a restaurant the order flow needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub zone_id: String,
    pub active: bool,
    pub available: bool,
    pub minimum_order: Decimal,
    /// Default preparation estimate in minutes
    pub preparation_minutes: i64,
    pub menu: Vec<Food>,
}

impl Restaurant {
    pub fn food(&self, id: &str) -> Option<&Food> {
        self.menu.iter().find(|f| f.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    /// Percent of the subtotal, e.g. `20` for 20%
    Percentage(Decimal),
    /// Fixed amount off
    Flat(Decimal),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub discount: Discount,
    /// Ceiling applied to percentage discounts
    #[serde(default)]
    pub max_discount: Option<Decimal>,
    pub enabled: bool,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub times_used: u32,
    /// `None` means the coupon is valid at every restaurant
    #[serde(default)]
    pub restaurant_id: Option<String>,
}

impl Coupon {
    /// Check the coupon can be redeemed at `restaurant_id` at `now`
    pub fn check(&self, restaurant_id: &str, now: DateTime<Utc>) -> Result<(), String> {
        if !self.enabled {
            return Err(format!("coupon '{}' is disabled", self.code));
        }
        if self.starts_at.is_some_and(|s| now < s) {
            return Err(format!("coupon '{}' is not active yet", self.code));
        }
        if self.ends_at.is_some_and(|e| now > e) {
            return Err(format!("coupon '{}' has expired", self.code));
        }
        if self.usage_limit.is_some_and(|limit| self.times_used >= limit) {
            return Err(format!("coupon '{}' has reached its usage limit", self.code));
        }
        if self
            .restaurant_id
            .as_deref()
            .is_some_and(|r| r != restaurant_id)
        {
            return Err(format!(
                "coupon '{}' is not valid at this restaurant",
                self.code
            ));
        }
        Ok(())
    }

    /// Discount on `subtotal`, always within `0..=subtotal`
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let raw = match self.discount {
            Discount::Percentage(pct) => {
                // Only an absurd percentage overflows; it clamps to the subtotal below
                let amount = subtotal
                    .checked_mul(pct)
                    .map_or(subtotal, |a| a / Decimal::ONE_HUNDRED);
                match self.max_discount {
                    Some(cap) if amount > cap => cap,
                    _ => amount,
                }
            }
            Discount::Flat(amount) => amount,
        };
        raw.max(Decimal::ZERO).min(subtotal).round_dp(2)
    }
}

/// One requested line of an order
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LineItemInput {
    #[validate(length(min = 1, message = "food id is required"))]
    pub food_id: String,
    #[validate(length(min = 1, message = "variation id is required"))]
    pub variation_id: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
}

/// A validated, priced line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedItem {
    pub food_id: String,
    pub variation_id: String,
    pub title: String,
    pub variation_title: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
}

/// Extra charges supplied with the order
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Charges {
    #[serde(default)]
    pub tip: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub delivery_charge: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub items: Vec<PricedItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub coupon_code: Option<String>,
    pub charges: Charges,
    pub total: Decimal,
}

/// Validate items against the menu and compute the order total.
///
/// Fails with a validation error listing every bad line, or the first
/// restaurant/minimum/coupon problem. Nothing is persisted here.
pub fn price_order(
    restaurant: &Restaurant,
    items: &[LineItemInput],
    coupon: Option<&Coupon>,
    charges: Charges,
    now: DateTime<Utc>,
) -> Result<PriceBreakdown, CourierError> {
    if !restaurant.active {
        return Err(CourierError::field("restaurant", "restaurant is not active"));
    }
    if !restaurant.available {
        return Err(CourierError::field(
            "restaurant",
            "restaurant is not accepting orders",
        ));
    }
    if items.is_empty() {
        return Err(CourierError::field("items", "order has no items"));
    }

    let mut priced = Vec::with_capacity(items.len());
    let mut problems = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match price_item(restaurant, item) {
            Ok(p) => priced.push(p),
            Err(message) => problems.push(FieldValidationError {
                field: format!("items[{}]", index),
                message,
            }),
        }
    }

    if !problems.is_empty() {
        return Err(ValidationError::FieldErrors(problems).into());
    }

    let subtotal = priced
        .iter()
        .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.line_total))
        .ok_or_else(|| CourierError::field("items", "order subtotal is out of range"))?;

    if subtotal < restaurant.minimum_order {
        return Err(CourierError::field(
            "subtotal",
            format!(
                "subtotal {} is below the restaurant minimum of {}",
                subtotal, restaurant.minimum_order
            ),
        ));
    }

    for (field, value) in [
        ("tip", charges.tip),
        ("tax", charges.tax),
        ("delivery_charge", charges.delivery_charge),
    ] {
        if value < Decimal::ZERO {
            return Err(CourierError::field(field, "must not be negative"));
        }
    }

    let discount = match coupon {
        Some(c) => {
            c.check(&restaurant.id, now)
                .map_err(|m| CourierError::field("coupon", m))?;
            c.discount_for(subtotal)
        }
        None => Decimal::ZERO,
    };

    let total = [charges.tip, charges.tax, charges.delivery_charge]
        .into_iter()
        .try_fold(subtotal - discount, |acc, charge| acc.checked_add(charge))
        .ok_or_else(|| CourierError::field("charges", "order total is out of range"))?;

    Ok(PriceBreakdown {
        items: priced,
        subtotal,
        discount,
        coupon_code: coupon.map(|c| c.code.clone()),
        charges,
        total,
    })
}

fn price_item(restaurant: &Restaurant, item: &LineItemInput) -> Result<PricedItem, String> {
    if item.quantity == 0 {
        return Err("quantity must be at least 1".to_string());
    }
    let food = restaurant
        .food(&item.food_id)
        .ok_or_else(|| format!("food '{}' is not on the menu", item.food_id))?;
    if food.out_of_stock {
        return Err(format!("'{}' is out of stock", food.title));
    }
    let variation = food
        .variations
        .iter()
        .find(|v| v.id == item.variation_id)
        .ok_or_else(|| {
            format!(
                "variation '{}' does not exist for '{}'",
                item.variation_id, food.title
            )
        })?;
    if variation.out_of_stock {
        return Err(format!(
            "'{} ({})' is out of stock",
            food.title, variation.title
        ));
    }

    let unit_price = variation.unit_price();
    let line_total = unit_price
        .checked_mul(Decimal::from(item.quantity))
        .ok_or_else(|| format!("quantity {} is too large", item.quantity))?;
    Ok(PricedItem {
        food_id: food.id.clone(),
        variation_id: variation.id.clone(),
        title: food.title.clone(),
        variation_title: variation.title.clone(),
        unit_price,
        quantity: item.quantity,
        line_total,
    })
}
