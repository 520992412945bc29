#[tokio::main]
async fn main() -> anyhow::Result<()> {
    restaurant_pos_lib::run().await
}
