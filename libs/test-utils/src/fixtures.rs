use customer_models::CreateCustomerCommand;
use order_models::{CreateOrderCommand, OrderStatus};
use product_models::CreateProductCommand;

pub fn product_command(name: &str, price_cents: i64) -> CreateProductCommand {
    CreateProductCommand {
        name: name.to_string(),
        description: format!("{name} description"),
        price_cents,
        stock: 10,
    }
}

pub fn customer_command(name: &str, email: &str) -> CreateCustomerCommand {
    CreateCustomerCommand {
        name: name.to_string(),
        email: email.to_string(),
    }
}

pub fn order_command(customer_id: i64, total_cents: i64) -> CreateOrderCommand {
    CreateOrderCommand {
        customer_id,
        status: OrderStatus::Pending,
        total_cents,
    }
}
