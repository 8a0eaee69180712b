use std::env;

use loyalty_eng::Engine;
use loyalty_eng::csv::{read_commands, write_statements};
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let path = env::args()
        .nth(1)
        .expect("usage: loyalty-eng <commands.csv>");

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let mut engine = Engine::new();
    let (cmd_sender, cmd_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in read_commands(&path) {
            match result {
                Ok(cmd) => {
                    cmd_sender.send(cmd).await.unwrap();
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    engine.run(ReceiverStream::new(cmd_receiver)).await;

    write_statements(engine.masons());
}
