use group_order_backend::run;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = run().await {
        eprintln!("group-order-backend failed to start: {}", e);
        std::process::exit(1);
    }
}
