#[cfg(not(unix))]
compile_error!("volsnapd talks to the storage target over a Unix domain socket");

use volsnap::controller::Volsnap;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Volsnap::from_environment()?.run().await
}
