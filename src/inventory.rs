use std::collections::HashMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq)]
pub enum InventoryError {
    #[error("barcode cannot be empty")]
    EmptyBarcode,
    #[error("a product with barcode {0} already exists")]
    DuplicateBarcode(String),
    #[error("no product found for barcode {0}")]
    UnknownBarcode(String),
    #[error("quantity must be greater than zero")]
    InvalidQuantity,
    #[error("movement reason cannot be empty")]
    EmptyReason,
    #[error("cannot remove {requested} units of {barcode}, only {available} in stock")]
    InsufficientStock {
        barcode: String,
        requested: u32,
        available: u32,
    },
}

/// A catalog entry, identified by its barcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub barcode: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub cost_price: f64,
    #[serde(default)]
    pub sale_price: f64,
    #[serde(default)]
    pub supplier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum MovementKind {
    /// Stock received ("entrada").
    #[strum(serialize = "entry")]
    Entry,
    /// Stock dispatched ("saída").
    #[strum(serialize = "exit")]
    Exit,
}

/// One audit-log line for a stock change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub barcode: String,
    pub quantity: u32,
    pub kind: MovementKind,
    pub reason: String,
    pub at: DateTime<Local>,
}

/// In-memory product catalog with a movement history log.
///
/// This is the host side of the scan flow: detected barcodes are looked up
/// here, and entry/exit operations append to the history (newest last).
#[derive(Debug, Default)]
pub struct Inventory {
    products: HashMap<String, Product>,
    movements: Vec<Movement>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the catalog from a product list, e.g. a parsed JSON file.
    pub fn with_products(products: Vec<Product>) -> Result<Self, InventoryError> {
        let mut inv = Self::new();
        for product in products {
            inv.register(product)?;
        }
        Ok(inv)
    }

    pub fn register(&mut self, product: Product) -> Result<(), InventoryError> {
        if product.barcode.trim().is_empty() {
            return Err(InventoryError::EmptyBarcode);
        }
        if self.products.contains_key(&product.barcode) {
            return Err(InventoryError::DuplicateBarcode(product.barcode));
        }
        info!(barcode = %product.barcode, name = %product.name, "product registered");
        self.products.insert(product.barcode.clone(), product);
        Ok(())
    }

    /// Replace the stored product with the same barcode.
    pub fn update(&mut self, product: Product) -> Result<(), InventoryError> {
        if product.barcode.trim().is_empty() {
            return Err(InventoryError::EmptyBarcode);
        }
        match self.products.get_mut(&product.barcode) {
            Some(existing) => {
                *existing = product;
                Ok(())
            }
            None => Err(InventoryError::UnknownBarcode(product.barcode)),
        }
    }

    pub fn remove(&mut self, barcode: &str) -> Result<Product, InventoryError> {
        self.products
            .remove(barcode)
            .ok_or_else(|| InventoryError::UnknownBarcode(barcode.to_string()))
    }

    pub fn find(&self, barcode: &str) -> Option<&Product> {
        self.products.get(barcode)
    }

    /// All products, sorted by name.
    pub fn list(&self) -> Vec<&Product> {
        let mut all: Vec<&Product> = self.products.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Record a stock entry ("entrada") and log the movement.
    pub fn add_stock(
        &mut self,
        barcode: &str,
        quantity: u32,
        reason: &str,
    ) -> Result<u32, InventoryError> {
        let reason = validated_reason(reason)?;
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity);
        }
        let product = self
            .products
            .get_mut(barcode)
            .ok_or_else(|| InventoryError::UnknownBarcode(barcode.to_string()))?;

        product.quantity += quantity;
        let new_quantity = product.quantity;
        self.log_movement(barcode, quantity, MovementKind::Entry, reason);
        Ok(new_quantity)
    }

    /// Record a stock exit ("saída") and log the movement.
    pub fn remove_stock(
        &mut self,
        barcode: &str,
        quantity: u32,
        reason: &str,
    ) -> Result<u32, InventoryError> {
        let reason = validated_reason(reason)?;
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity);
        }
        let product = self
            .products
            .get_mut(barcode)
            .ok_or_else(|| InventoryError::UnknownBarcode(barcode.to_string()))?;

        if product.quantity < quantity {
            return Err(InventoryError::InsufficientStock {
                barcode: barcode.to_string(),
                requested: quantity,
                available: product.quantity,
            });
        }
        product.quantity -= quantity;
        let new_quantity = product.quantity;
        self.log_movement(barcode, quantity, MovementKind::Exit, reason);
        Ok(new_quantity)
    }

    /// Full movement history, oldest first.
    pub fn history(&self) -> &[Movement] {
        &self.movements
    }

    pub fn history_for(&self, barcode: &str) -> Vec<&Movement> {
        self.movements
            .iter()
            .filter(|m| m.barcode == barcode)
            .collect()
    }

    fn log_movement(&mut self, barcode: &str, quantity: u32, kind: MovementKind, reason: &str) {
        info!(%barcode, quantity, %kind, reason, "stock movement");
        self.movements.push(Movement {
            barcode: barcode.to_string(),
            quantity,
            kind,
            reason: reason.to_string(),
            at: Local::now(),
        });
    }
}

fn validated_reason(reason: &str) -> Result<&str, InventoryError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(InventoryError::EmptyReason);
    }
    Ok(trimmed)
}
