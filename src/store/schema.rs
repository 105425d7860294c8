//! ERP schema: sales, inventory, finance and analytics tables.

use anyhow::{Context, Result};
use rusqlite::Connection;

pub const SALES_TABLES: &[&str] = &["customers", "leads", "orders"];
pub const INVENTORY_TABLES: &[&str] = &["products", "stock"];
pub const FINANCE_TABLES: &[&str] = &["invoices", "customers"];
pub const ANALYTICS_TABLES: &[&str] = &["glossary"];

/// Every table the store owns, in creation order.
pub const ALL_TABLES: &[&str] = &[
    "customers",
    "leads",
    "orders",
    "products",
    "stock",
    "glossary",
    "invoices",
];

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    phone TEXT,
    address TEXT
);

CREATE TABLE IF NOT EXISTS leads (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT,
    status TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY,
    customer_id INTEGER,
    order_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    status TEXT NOT NULL,
    FOREIGN KEY (customer_id) REFERENCES customers(id)
);

CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    sku TEXT UNIQUE NOT NULL,
    description TEXT,
    price REAL,
    stock_level INTEGER
);

CREATE TABLE IF NOT EXISTS stock (
    product_id INTEGER PRIMARY KEY,
    location TEXT,
    quantity INTEGER,
    FOREIGN KEY (product_id) REFERENCES products(id)
);

CREATE TABLE IF NOT EXISTS glossary (
    term TEXT PRIMARY KEY,
    definition TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS invoices (
    id INTEGER PRIMARY KEY,
    customer_id INTEGER,
    amount REAL,
    status TEXT NOT NULL,
    invoice_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (customer_id) REFERENCES customers(id)
);
";

/// Create all ERP tables. Safe to run repeatedly.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)
        .context("Failed to create ERP tables")
}

/// Compact schema description handed to the completion service when it has
/// to write SQL on the user's behalf.
pub fn describe() -> &'static str {
    "customers(id, name, email, phone, address)\n\
     leads(id, name, email, status, created_at)\n\
     orders(id, customer_id -> customers.id, order_date, status)\n\
     products(id, name, sku, description, price, stock_level)\n\
     stock(product_id -> products.id, location, quantity)\n\
     invoices(id, customer_id -> customers.id, amount, status, invoice_date)\n\
     glossary(term, definition)"
}
