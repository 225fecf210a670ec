//! EcoCheck server binary.
//!
use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use clap::Parser;
use ecocheck::{
    camera::{CameraProvider, V4lCameraProvider},
    config::Config,
    endpoints,
    fake::{FakeCameraProvider, FakeClassifier, FakeModelLoader},
    meter::spawn_meter_logger,
    model::{ModelLoader, RemoteModelLoader},
    session::{LoopSettings, Session},
    ui::UiBinder,
};
use env_logger::TimestampPrecision;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let (loader, cameras): (Box<dyn ModelLoader>, Box<dyn CameraProvider>) = if config.demo {
        log::info!("Running with simulated camera and model");
        let classifier = Arc::new(FakeClassifier::new(&[
            ("Recyclable", 0.72),
            ("Not recyclable", 0.21),
            ("Background", 0.07),
        ]));
        (
            Box::new(FakeModelLoader::new(classifier)) as Box<dyn ModelLoader>,
            Box::new(FakeCameraProvider::new()) as Box<dyn CameraProvider>,
        )
    } else {
        let loader = RemoteModelLoader::new(&config)?;
        log::info!(
            "Model {} cached in {}",
            loader.base_url(),
            loader.cache_dir().display()
        );
        (
            Box::new(loader) as Box<dyn ModelLoader>,
            Box::new(V4lCameraProvider::new(&config)) as Box<dyn CameraProvider>,
        )
    };

    let ui = Arc::new(UiBinder::new(config.resolution())?);
    let session = Session::new(Arc::clone(&ui), loader, cameras, LoopSettings::from(&config));

    spawn_meter_logger();

    // Build HTTP server with endpoints
    let app = endpoints::router(Arc::new(Mutex::new(session)), ui);

    // Serve HTTP server
    let addr: SocketAddr = config.server_address.parse()?;
    log::info!("Serving on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
