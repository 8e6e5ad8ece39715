use super::profile::SelectorProfile;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref DOLLAR_AMOUNT: Regex = Regex::new(r"\$\s*([0-9]+(?:\.[0-9]{1,2})?)").unwrap();
    static ref UNIT_AMOUNT: Regex =
        Regex::new(r"\$\s*([0-9]+(?:\.[0-9]{1,2})?)\s*/\s*").unwrap();
    static ref BODY: Selector = Selector::parse("body").unwrap();
}

/// Elements whose text is never shown.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

fn normalize(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().replace(',', "")
}

fn capture_amount(re: &Regex, text: &str) -> Option<Decimal> {
    let text = normalize(text);
    let amount = re.captures(&text)?.get(1)?;
    Decimal::from_str(amount.as_str()).ok()
}

/// The first `$` amount in `text`, like `$3.50` or `$ 12`.
pub fn parse_dollar_amount(text: &str) -> Option<Decimal> {
    capture_amount(&DOLLAR_AMOUNT, text)
}

/// The first `$` amount followed by a `/`, like `$1.75 / 1L`.
pub fn parse_unit_amount(text: &str) -> Option<Decimal> {
    capture_amount(&UNIT_AMOUNT, text)
}

/// Values read from one page snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Shelf price.
    pub price: Option<Decimal>,
    /// Unit price.
    pub unit_price: Option<Decimal>,
    /// Price before a promotion.
    pub was_price: Option<Decimal>,
    /// Promotion label.
    pub promo_text: Option<String>,
}

/// Text of the first element matching `selector`.
fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = match Selector::parse(selector) {
        Ok(selector) => selector,
        Err(_) => {
            log::debug!("skipping invalid selector {selector}");
            return None;
        }
    };

    let element = document.select(&selector).next()?;
    let text = element.text().collect::<String>();
    let text = text.trim();

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn find_amount<F>(document: &Html, selectors: &[String], parse: F) -> Option<Decimal>
where
    F: Fn(&str) -> Option<Decimal>,
{
    selectors
        .iter()
        .find_map(|selector| first_text(document, selector).and_then(|t| parse(&t)))
}

/// Visible text of the page body.
fn visible_text(document: &Html) -> String {
    let body = match document.select(&BODY).next() {
        Some(body) => body,
        None => document.root_element(),
    };

    let mut text = String::new();

    for node in body.descendants() {
        if let Some(chunk) = node.value().as_text() {
            let hidden = node
                .parent()
                .and_then(ElementRef::wrap)
                .map(|parent| HIDDEN_ELEMENTS.contains(&parent.value().name()))
                .unwrap_or_default();

            if !hidden {
                text.push_str(chunk);
                text.push(' ');
            }
        }
    }

    text
}

/// Read a product page with a profile. Falls back to the first `$` amount in
/// the visible text when no price selector yields one.
pub fn extract(profile: &SelectorProfile, html: &str) -> Extraction {
    let document = Html::parse_document(html);

    let price = find_amount(&document, &profile.price_selectors, parse_dollar_amount)
        .or_else(|| parse_dollar_amount(&visible_text(&document)));

    Extraction {
        price,
        unit_price: find_amount(&document, &profile.unit_price_selectors, parse_unit_amount),
        was_price: find_amount(&document, &profile.was_price_selectors, parse_dollar_amount),
        promo_text: profile
            .promo_selectors
            .iter()
            .find_map(|selector| first_text(&document, selector))
            .map(|t| normalize_label(&t)),
    }
}

fn normalize_label(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::profile::SelectorProfiles;
    use crate::store::StoreId;

    fn dec(v: &str) -> Decimal {
        Decimal::from_str(v).unwrap()
    }

    #[test]
    fn test_parse_dollar_amount() {
        assert_eq!(parse_dollar_amount("$3.50"), Some(dec("3.50")));
        assert_eq!(parse_dollar_amount("Now  $\n 12 each"), Some(dec("12")));
        assert_eq!(parse_dollar_amount("$1,299.00"), Some(dec("1299.00")));
        assert_eq!(parse_dollar_amount("3.50"), None);
        assert_eq!(parse_dollar_amount(""), None);
    }

    #[test]
    fn test_parse_unit_amount_needs_slash() {
        assert_eq!(parse_unit_amount("$1.75 / 1L"), Some(dec("1.75")));
        assert_eq!(parse_unit_amount("$0.35/100g"), Some(dec("0.35")));
        assert_eq!(parse_unit_amount("$1.75 per litre"), None);
    }

    #[test]
    fn test_extract_coles_page() {
        let profiles = SelectorProfiles::default();
        let profile = profiles.get(StoreId::Coles).unwrap();
        let html = r#"<html><body>
            <span class="price__value" data-testid="pricing">$3.50</span>
            <span data-testid="unitPricing">$1.75 / 1L</span>
        </body></html>"#;

        let extraction = extract(profile, html);
        assert_eq!(extraction.price, Some(dec("3.50")));
        assert_eq!(extraction.unit_price, Some(dec("1.75")));
        assert_eq!(extraction.was_price, None);
    }

    #[test]
    fn test_extract_woolworths_secondary_selector() {
        let profiles = SelectorProfiles::default();
        let profile = profiles.get(StoreId::Woolworths).unwrap();
        let html = r#"<html><body>
            <div class="sr-only" id="product-price-sr">Price $ 4.20</div>
            <div class="sr-only" id="cup-price-sr">$2.10 / 1KG</div>
        </body></html>"#;

        let extraction = extract(profile, html);
        assert_eq!(extraction.price, Some(dec("4.20")));
        assert_eq!(extraction.unit_price, Some(dec("2.10")));
    }

    #[test]
    fn test_extract_falls_back_to_visible_text() {
        let profiles = SelectorProfiles::default();
        let profile = profiles.get(StoreId::Aldi).unwrap();
        let html = r#"<html><head><script>var p = "$99.99";</script></head>
            <body><script>var q = "$88.88";</script><p>Only <b>$2.49</b> today</p></body></html>"#;

        assert_eq!(extract(profile, html).price, Some(dec("2.49")));
    }

    #[test]
    fn test_extract_nothing() {
        let profiles = SelectorProfiles::default();
        let profile = profiles.get(StoreId::Coles).unwrap();
        let extraction = extract(profile, "<html><body><p>Out of stock</p></body></html>");
        assert_eq!(extraction, Extraction::default());
    }

    #[test]
    fn test_extract_was_price_and_promo() {
        let profile = SelectorProfiles::default()
            .get(StoreId::Coles)
            .unwrap()
            .clone()
            .with_was_price_selectors(&[".was"])
            .with_promo_selectors(&[".promo"]);
        let html = r#"<body><span data-testid="pricing">$2.00</span>
            <span class="was">Was $4.00</span><span class="promo"> 1/2   Price </span></body>"#;

        let extraction = extract(&profile, html);
        assert_eq!(extraction.price, Some(dec("2.00")));
        assert_eq!(extraction.was_price, Some(dec("4.00")));
        assert_eq!(extraction.promo_text.as_deref(), Some("1/2 Price"));
    }
}
