#[tokio::main]
async fn main() {
    if let Err(e) = mic_meter_lib::run().await {
        log::error!("{}", e);
        eprintln!("mic-meter: {}", e);
        std::process::exit(1);
    }
}
