use std::net::SocketAddr;

use execload_testserver::Behavior;
use tokio::net::TcpListener;

fn parse_status(flag: &str, value: Option<String>) -> anyhow::Result<u16> {
    let value = value.ok_or_else(|| anyhow::anyhow!("{flag} requires a status code, e.g. 503"))?;
    Ok(value.parse()?)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut behavior = Behavior::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "--execute-status" => {
                behavior.execute_status = parse_status(&arg, args.next())?;
            }
            "--sink-status" => {
                behavior.sink_status = parse_status(&arg, args.next())?;
            }
            "--no-timing-headers" => behavior.timing_headers = false,
            "-h" | "--help" => {
                eprintln!(
                    "execload-testserver\n\nUSAGE:\n  execload-testserver [--bind 127.0.0.1:0] [--execute-status 200] [--sink-status 200] [--no-timing-headers]\n\nOUTPUT:\n  Prints HTTP_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let stats = execload_testserver::TestServerStats::default();
    let app = execload_testserver::router(stats, behavior);

    println!("HTTP_URL=http://{addr}");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
    });

    serve.await?;
    Ok(())
}
