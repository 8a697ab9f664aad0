//! Order domain: status machine, pricing, lifecycle and chat

pub mod chat;
pub mod lifecycle;
pub mod pricing;
pub mod status;

pub use chat::ChatMessage;
pub use lifecycle::{NewOrder, Order, Rider};
pub use pricing::{Charges, Coupon, Discount, Food, LineItemInput, PriceBreakdown, Restaurant, Variation};
pub use status::OrderStatus;
