use std::sync::Arc;

use fcb_convertio::ConvertioClient;
use fcb_core::{config::Config, ports::ConversionPort};

#[tokio::main]
async fn main() -> Result<(), fcb_core::Error> {
    fcb_core::logging::init("fcb")?;

    let cfg = Arc::new(Config::load()?);
    let provider: Arc<dyn ConversionPort> =
        Arc::new(ConvertioClient::new(cfg.convertio_api_key.clone())?);

    fcb_telegram::router::run_polling(cfg, provider)
        .await
        .map_err(|e| fcb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
