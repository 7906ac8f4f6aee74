use detector_benchmark::{config, start_app, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = config::get_configuration()?;
    telemetry::init_subscriber(&settings);

    start_app(settings).await
}
