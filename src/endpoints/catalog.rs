use super::EndpointSpec;
use http::Method;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

const ITEM_LIST_QUERY: &[&str] = &[
    "limit",
    "offset",
    "locale",
    "additional_fields[]",
    "country",
    "promo_code",
];
const ITEM_QUERY: &[&str] = &["locale", "additional_fields[]", "country", "promo_code"];
const CART_QUERY: &[&str] = &["currency", "locale"];

static BUILTIN: Lazy<Arc<EndpointCatalog>> =
    Lazy::new(|| Arc::new(EndpointCatalog::new(builtin_endpoints())));

/// Endpoint table indexed by operation id.
#[derive(Debug, Clone, Default)]
pub struct EndpointCatalog {
    endpoints: Vec<EndpointSpec>,
    by_id: HashMap<String, usize>,
}

impl EndpointCatalog {
    /// Build a catalog; a later entry with the same operation id replaces an earlier one.
    #[must_use]
    pub fn new(endpoints: Vec<EndpointSpec>) -> Self {
        let mut catalog = Self::default();
        for endpoint in endpoints {
            catalog.insert(endpoint);
        }
        catalog
    }

    pub fn insert(&mut self, endpoint: EndpointSpec) {
        match self.by_id.get(&endpoint.operation_id) {
            Some(&index) => self.endpoints[index] = endpoint,
            None => {
                self.by_id
                    .insert(endpoint.operation_id.clone(), self.endpoints.len());
                self.endpoints.push(endpoint);
            }
        }
    }

    /// In-game store endpoints shipped with the crate.
    #[must_use]
    pub fn builtin() -> Arc<EndpointCatalog> {
        Arc::clone(&BUILTIN)
    }

    #[must_use]
    pub fn get(&self, operation_id: &str) -> Option<&EndpointSpec> {
        self.by_id
            .get(operation_id)
            .map(|&index| &self.endpoints[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointSpec> {
        self.endpoints.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

fn builtin_endpoints() -> Vec<EndpointSpec> {
    const P: &str = "/v2/project/{project_id}";
    let ep = |id: &str, method: Method, suffix: &str| {
        EndpointSpec::new(id, method, &format!("{P}{suffix}"))
    };

    vec![
        // Catalog
        ep("get_virtual_items", Method::GET, "/items/virtual_items").with_query(ITEM_LIST_QUERY),
        ep("get_all_virtual_items", Method::GET, "/items/virtual_items/all")
            .with_query(&["locale", "promo_code"]),
        ep(
            "get_virtual_items_group",
            Method::GET,
            "/items/virtual_items/group/{external_id}",
        )
        .with_query(ITEM_LIST_QUERY),
        ep(
            "get_virtual_items_sku",
            Method::GET,
            "/items/virtual_items/sku/{item_sku}",
        )
        .with_query(ITEM_QUERY),
        ep("get_virtual_currency", Method::GET, "/items/virtual_currency")
            .with_query(ITEM_LIST_QUERY),
        ep(
            "get_virtual_currency_package",
            Method::GET,
            "/items/virtual_currency/package",
        )
        .with_query(ITEM_LIST_QUERY),
        ep("get_bundle_list", Method::GET, "/items/bundle").with_query(ITEM_LIST_QUERY),
        ep("get_bundle", Method::GET, "/items/bundle/sku/{sku}")
            .with_query(&["locale", "country", "promo_code"]),
        ep("get_item_groups", Method::GET, "/items/groups").with_query(&["promo_code"]),
        // Cart
        ep("get_user_cart", Method::GET, "/cart").with_query(CART_QUERY),
        ep("get_cart_by_id", Method::GET, "/cart/{cart_id}").with_query(CART_QUERY),
        ep("put_item", Method::PUT, "/cart/item/{item_sku}").with_body(),
        ep("delete_item", Method::DELETE, "/cart/item/{item_sku}"),
        ep(
            "put_item_by_cart_id",
            Method::PUT,
            "/cart/{cart_id}/item/{item_sku}",
        )
        .with_body(),
        ep(
            "delete_item_by_cart_id",
            Method::DELETE,
            "/cart/{cart_id}/item/{item_sku}",
        ),
        ep("cart_fill", Method::PUT, "/cart/fill").with_body(),
        ep("cart_fill_by_id", Method::PUT, "/cart/{cart_id}/fill").with_body(),
        ep("cart_clear", Method::PUT, "/cart/clear"),
        ep("cart_clear_by_id", Method::PUT, "/cart/{cart_id}/clear"),
        // Payment
        ep("create_order", Method::POST, "/payment/cart").with_body(),
        ep("create_order_by_cart_id", Method::POST, "/payment/cart/{cart_id}").with_body(),
        ep("create_order_with_item", Method::POST, "/payment/item/{item_sku}").with_body(),
        ep(
            "create_order_with_item_for_virtual_currency",
            Method::POST,
            "/payment/item/{item_sku}/virtual/{virtual_currency_sku}",
        )
        .with_query(&["platform"])
        .with_body(),
        ep("get_order", Method::GET, "/order/{order_id}"),
        // Promotions
        ep("redeem_coupon", Method::POST, "/coupon/redeem").with_body(),
        ep(
            "get_coupon_rewards",
            Method::GET,
            "/coupon/code/{coupon_code}/rewards",
        ),
        ep("redeem_promo_code", Method::POST, "/promocode/redeem").with_body(),
        ep(
            "get_promo_code_rewards",
            Method::GET,
            "/promocode/code/{promocode_code}/rewards",
        ),
        // Free items
        ep("create_free_order", Method::POST, "/free/cart"),
        ep("create_free_order_with_item", Method::POST, "/free/item/{item_sku}"),
    ]
}
