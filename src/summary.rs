//! Cart Summary

use std::io;

use rusty_money::iso::Currency;
use serde::Serialize;
use tabled::{
    builder::Builder,
    settings::{Alignment, Color, Style, object::Columns, object::Rows},
};

use crate::money::{Price, round2};

/// Derived pricing for a cart. Always recomputed wholesale; never patched field by field.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSummary {
    /// Sum of pre-discount line totals
    pub subtotal: Price,

    /// Sum of item-level discounts
    pub item_discount_total: Price,

    /// Discount from the applied promo code
    pub promo_discount: Price,

    /// Tax on the subtotal after item discounts
    pub tax: Price,

    /// Delivery fee after any free-shipping promo
    pub delivery_fee: Price,

    /// Flat service fee
    pub service_fee: Price,

    /// Amount payable, never negative
    pub total: Price,

    /// Whether a promo code contributed to this summary
    pub promo_applied: bool,

    /// The promo code attached to the cart, whether or not it qualified
    pub promo_code: Option<String>,
}

/// Display/API form of a [`CartSummary`], with every amount rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPayload {
    /// ISO currency code
    pub currency: String,
    /// Subtotal
    pub subtotal: String,
    /// Item discount total
    pub item_discount_total: String,
    /// Promo discount
    pub promo_discount: String,
    /// Tax
    pub tax: String,
    /// Delivery fee
    pub delivery_fee: String,
    /// Service fee
    pub service_fee: String,
    /// Total
    pub total: String,
    /// Promo applied flag
    pub promo_applied: bool,
    /// Promo code
    pub promo_code: Option<String>,
}

impl CartSummary {
    /// Currency of every amount in the summary.
    pub fn currency(&self) -> &'static Currency {
        self.total.currency()
    }

    /// Rounds the summary for display or an API payload.
    pub fn payload(&self) -> SummaryPayload {
        SummaryPayload {
            currency: self.currency().iso_alpha_code.to_string(),
            subtotal: round2(&self.subtotal).to_string(),
            item_discount_total: round2(&self.item_discount_total).to_string(),
            promo_discount: round2(&self.promo_discount).to_string(),
            tax: round2(&self.tax).to_string(),
            delivery_fee: round2(&self.delivery_fee).to_string(),
            service_fee: round2(&self.service_fee).to_string(),
            total: round2(&self.total).to_string(),
            promo_applied: self.promo_applied,
            promo_code: self.promo_code.clone(),
        }
    }

    /// Writes a breakdown table.
    ///
    /// # Errors
    ///
    /// Returns an IO error if writing fails.
    pub fn write_to(&self, mut out: impl io::Write) -> io::Result<()> {
        let mut builder = Builder::default();

        builder.push_record(["", "Amount"]);
        builder.push_record(["Subtotal".to_string(), self.subtotal.to_string()]);
        builder.push_record([
            "Item discounts".to_string(),
            negated(&self.item_discount_total),
        ]);

        let promo_label = match &self.promo_code {
            Some(code) if self.promo_applied => format!("Promo ({code})"),
            Some(code) => format!("Promo ({code}, not applied)"),
            None => "Promo".to_string(),
        };
        builder.push_record([promo_label, negated(&self.promo_discount)]);

        builder.push_record(["Tax".to_string(), self.tax.to_string()]);
        builder.push_record(["Delivery".to_string(), self.delivery_fee.to_string()]);
        builder.push_record(["Service fee".to_string(), self.service_fee.to_string()]);
        builder.push_record(["Total".to_string(), self.total.to_string()]);

        let mut table = builder.build();
        table.with(Style::modern_rounded());
        table.modify(Rows::first(), Color::BOLD);
        table.modify(Rows::last(), Color::BOLD);
        table.modify(Columns::new(1..2), Alignment::right());

        writeln!(out, "{table}")
    }
}

fn negated(amount: &Price) -> String {
    if amount.to_minor_units() == 0 {
        amount.to_string()
    } else {
        format!("-{amount}")
    }
}
