use super::context::AppContext;

pub async fn disconnect() -> Result<(), Box<dyn std::error::Error>> {
    let context = AppContext::load(None).await?;
    context.controller.disconnect().await?;
    println!("Disconnected.");
    Ok(())
}
