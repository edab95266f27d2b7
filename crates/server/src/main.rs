use hg_core::Config;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    hg_core::log();
    let config = Config::from_env();
    hg_server::run(config).await
}
