use hdp_ds_server::{config, init_tracing};

#[tokio::main]
async fn main() {
    init_tracing();

    let cfg = match config::loader::load_config(None) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = hdp_ds_server::run(cfg).await {
        eprintln!("ds server error: {err}");
    }
}
