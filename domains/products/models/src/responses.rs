use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::Product;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price_cents: product.price_cents,
            stock: product.stock,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::CreateProductCommand;

    #[test]
    fn test_create_command_defaults_optional_fields() {
        let command: CreateProductCommand =
            serde_json::from_str(r#"{"name": "Lamp", "price_cents": 2500}"#)
                .unwrap();

        assert_eq!(command.description, "");
        assert_eq!(command.stock, 0);
    }

    #[test]
    fn test_response_mirrors_model() {
        let now = Utc::now();
        let response = ProductResponse::from(Product {
            id: 3,
            name: "Lamp".into(),
            description: "Desk lamp".into(),
            price_cents: 2500,
            stock: 4,
            created_at: now,
            updated_at: now,
        });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["price_cents"], 2500);
    }
}
