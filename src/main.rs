#[tokio::main]
async fn main() {
    if let Err(e) = cluster_query::run().await {
        eprintln!("cluster-query: {e}");
        std::process::exit(1);
    }
}
