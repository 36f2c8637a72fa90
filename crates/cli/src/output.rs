//! Terminal output.

use bazaar_core::{CurrencyCode, ProductSnapshot};
use bazaar_storefront::notice::{Notice, NoticeKind};
use bazaar_storefront::views::{CollectionView, format_price};
use serde::Serialize;

use crate::commands::CommandError;

/// Output format selected with `--json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Text,
    Json,
}

impl Output {
    /// Print a collection.
    pub fn view(self, view: &CollectionView) -> Result<(), CommandError> {
        match self {
            Self::Json => print_json(view),
            Self::Text => {
                print_lines(&render_view(view));
                Ok(())
            }
        }
    }

    /// Print a mutation notice.
    pub fn notice(self, notice: &Notice) -> Result<(), CommandError> {
        match self {
            Self::Json => print_json(notice),
            Self::Text => {
                print_lines(&[render_notice(notice)]);
                Ok(())
            }
        }
    }

    /// Print product details.
    pub fn product(
        self,
        product: &ProductSnapshot,
        currency: CurrencyCode,
    ) -> Result<(), CommandError> {
        match self {
            Self::Json => print_json(product),
            Self::Text => {
                print_lines(&[format!(
                    "{}  {}  {}",
                    product.id,
                    product.title,
                    format_price(product.unit_price, currency)
                )]);
                Ok(())
            }
        }
    }
}

fn render_view(view: &CollectionView) -> Vec<String> {
    if view.is_empty {
        return vec![view.empty_message().to_string()];
    }

    let mut lines: Vec<String> = view
        .items
        .iter()
        .map(|item| {
            format!(
                "{:>3} x {}  {} ({})  [{}]",
                item.quantity, item.title, item.line_price, item.price, item.product_id
            )
        })
        .collect();
    lines.push(format!("Total: {}", view.total));
    lines
}

fn render_notice(notice: &Notice) -> String {
    let marker = match notice.kind {
        NoticeKind::Success => "ok",
        NoticeKind::Failure => "error",
        NoticeKind::SignInRequired => "sign-in",
    };
    format!("[{marker}] {}", notice.message)
}

#[allow(clippy::print_stdout)]
fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

#[allow(clippy::print_stdout)]
fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
