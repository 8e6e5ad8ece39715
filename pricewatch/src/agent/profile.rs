use crate::store::StoreId;

/// How to recognise and read a store's product page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorProfile {
    /// The store the profile reads.
    pub store: StoreId,
    /// Substring the page host must contain.
    pub host: String,
    /// Substring the page url must contain for a product page.
    pub product_path: String,
    /// Price selectors, most specific first.
    pub price_selectors: Vec<String>,
    /// Unit price selectors, most specific first.
    pub unit_price_selectors: Vec<String>,
    /// Was price selectors.
    pub was_price_selectors: Vec<String>,
    /// Promotion label selectors.
    pub promo_selectors: Vec<String>,
}

impl SelectorProfile {
    /// A new profile with no selectors.
    pub fn new(store: StoreId, host: impl Into<String>, product_path: impl Into<String>) -> Self {
        Self {
            store,
            host: host.into(),
            product_path: product_path.into(),
            price_selectors: Vec::new(),
            unit_price_selectors: Vec::new(),
            was_price_selectors: Vec::new(),
            promo_selectors: Vec::new(),
        }
    }

    /// Set the price selectors.
    pub fn with_price_selectors(mut self, selectors: &[&str]) -> Self {
        self.price_selectors = to_owned(selectors);
        self
    }

    /// Set the unit price selectors.
    pub fn with_unit_price_selectors(mut self, selectors: &[&str]) -> Self {
        self.unit_price_selectors = to_owned(selectors);
        self
    }

    /// Set the was price selectors.
    pub fn with_was_price_selectors(mut self, selectors: &[&str]) -> Self {
        self.was_price_selectors = to_owned(selectors);
        self
    }

    /// Set the promotion selectors.
    pub fn with_promo_selectors(mut self, selectors: &[&str]) -> Self {
        self.promo_selectors = to_owned(selectors);
        self
    }

    /// Does the url belong to this store at all.
    pub fn matches_host(&self, url: &url::Url) -> bool {
        url.host_str()
            .map(|host| host.contains(self.host.as_str()))
            .unwrap_or_default()
    }

    /// Is the url a product page of this store.
    pub fn matches(&self, url: &url::Url) -> bool {
        self.matches_host(url) && url.as_str().contains(self.product_path.as_str())
    }
}

fn to_owned(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(|s| s.to_string()).collect()
}

/// The profile table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorProfiles {
    profiles: Vec<SelectorProfile>,
}

impl Default for SelectorProfiles {
    fn default() -> Self {
        Self {
            profiles: vec![
                SelectorProfile::new(StoreId::Woolworths, "woolworths.com.au", "/shop/productdetails/")
                    .with_price_selectors(&[
                        "div.product-price_component_price-lead__vlm8f",
                        "div.sr-only#product-price-sr",
                        r#"[aria-labelledby="product-price-sr"]"#,
                    ])
                    .with_unit_price_selectors(&[
                        "div.product-unit-price_component_price-cup-string__HdxP0",
                        "div.sr-only#cup-price-sr",
                        r#"[aria-labelledby="cup-price-sr"]"#,
                    ]),
                SelectorProfile::new(StoreId::Coles, "coles.com.au", "/product/")
                    .with_price_selectors(&[
                        r#"span.price__value[data-testid="pricing"]"#,
                        r#"[data-testid="pricing"]"#,
                    ])
                    .with_unit_price_selectors(&[r#"[data-testid="unitPricing"]"#, "span.unit-price"]),
                SelectorProfile::new(StoreId::Aldi, "aldi.com.au", "/product/")
                    .with_price_selectors(&["span.base-price__regular span"]),
            ],
        }
    }
}

impl SelectorProfiles {
    /// An empty table.
    pub fn empty() -> Self {
        Self {
            profiles: Vec::new(),
        }
    }

    /// Add or replace the profile for a store.
    pub fn with_profile(mut self, profile: SelectorProfile) -> Self {
        match self.profiles.iter_mut().find(|p| p.store == profile.store) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
        self
    }

    /// The profile of a store.
    pub fn get(&self, store: StoreId) -> Option<&SelectorProfile> {
        self.profiles.iter().find(|p| p.store == store)
    }

    /// The profile whose product pages include `url`.
    pub fn resolve(&self, url: &str) -> Option<&SelectorProfile> {
        let url = url::Url::parse(url).ok()?;
        self.profiles.iter().find(|p| p.matches(&url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_product_pages() {
        let profiles = SelectorProfiles::default();

        let woolworths = profiles
            .resolve("https://www.woolworths.com.au/shop/productdetails/12345/milk")
            .unwrap();
        assert_eq!(woolworths.store, StoreId::Woolworths);

        let coles = profiles
            .resolve("https://www.coles.com.au/product/coles-milk-2l-123")
            .unwrap();
        assert_eq!(coles.store, StoreId::Coles);

        assert!(profiles
            .resolve("https://www.coles.com.au/search?q=milk")
            .is_none());
        assert!(profiles.resolve("https://example.com/product/1").is_none());
        assert!(profiles.resolve("not a url").is_none());
    }

    #[test]
    fn test_every_store_has_a_builtin_profile() {
        let profiles = SelectorProfiles::default();

        for store in StoreId::all() {
            let profile = profiles.get(store).unwrap();
            assert_eq!(profile.store, store);
            assert!(!profile.price_selectors.is_empty());
        }
    }

    #[test]
    fn test_with_profile_replaces_store() {
        let profiles = SelectorProfiles::default().with_profile(
            SelectorProfile::new(StoreId::Aldi, "aldi.com.au", "/p/")
                .with_price_selectors(&[".price"]),
        );

        assert_eq!(profiles.get(StoreId::Aldi).unwrap().product_path, "/p/");
        assert!(profiles
            .resolve("https://www.aldi.com.au/p/bread")
            .is_some());
        assert!(SelectorProfiles::empty().get(StoreId::Coles).is_none());
    }
}
