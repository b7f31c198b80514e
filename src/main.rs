use std::sync::Arc;

use image_detect::classifier::{Classifier, HttpClassifier};
use image_detect::config::{AppState, Config};
use image_detect::detect::{DetectHandler, DetectSettings};
use image_detect::{logger, server, store};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load()?;
    logger::init(&cfg)?;

    // Size the runtime from `server.workers`, default is one thread per core
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    let record_store = store::open(&cfg.store)?;
    let classifier: Arc<dyn Classifier> = Arc::new(HttpClassifier::new(&cfg.classifier)?);
    if cfg.classifier.model_ref.is_empty() {
        logger::log_warning(
            "classifier.model_ref is empty; set PROJECT_VERSION_ARN or DETECT_CLASSIFIER__MODEL_REF",
        );
    }

    let detector = DetectHandler::new(
        Arc::clone(&record_store),
        Arc::clone(&classifier),
        DetectSettings::from_config(&cfg.classifier),
    );
    let state = Arc::new(AppState::new(&cfg, detector, Arc::clone(&record_store)));

    let listener = server::create_reusable_listener(addr)?;
    logger::log_server_start(&addr, &cfg, &record_store.describe(), &classifier.describe());

    server::start_server_loop(listener, state, server::shutdown_signal()).await
}
