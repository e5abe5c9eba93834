use clap::Parser;
use simple_git_hook::api::build_router;
use simple_git_hook::executor::Executor;
use simple_git_hook::logging::{FileLogger, setup_logging};
use simple_git_hook::queue::job_queue;
use simple_git_hook::settings::Settings;
use simple_git_hook::load_config;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let settings = Settings::parse();

    let file_logger = settings.log_dir.clone().map(FileLogger::new);
    let _log_guard = match setup_logging(file_logger.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Logging setup error: {}", e);
            std::process::exit(1);
        }
    };

    let config = match load_config(&settings.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Loaded {} endpoint(s) from {:?}",
        config.len(),
        settings.config
    );

    let (jobs, queue) = job_queue(settings.queue_capacity());
    tokio::spawn(Executor::new(queue, settings.executor()).run());

    let app = build_router(config, jobs);

    let result = match settings.tls_files() {
        Some((cert, key)) => {
            let tls = match axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key).await {
                Ok(tls) => tls,
                Err(e) => {
                    error!("TLS setup error: {}", e);
                    std::process::exit(1);
                }
            };
            info!("Listening on https://{}", settings.listen);
            axum_server::bind_rustls(settings.listen, tls)
                .serve(app.into_make_service())
                .await
        }
        None => match tokio::net::TcpListener::bind(settings.listen).await {
            Ok(listener) => {
                info!("Listening on http://{}", settings.listen);
                axum::serve(listener, app).await
            }
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
