//! Request frontend: accepts matchmaking RPC connections and funnels them,
//! one request/reply pair each, into the matchmaker's in-process channel.
//! No authentication happens here.

use crate::matchmaker::IncomingRequest;
use arena_wire::{read_frame, write_frame, QuickMatchRequest};
use prost::Message;
use std::io;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub(crate) async fn serve(listener: TcpListener, requests: mpsc::Sender<IncomingRequest>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let requests = requests.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, requests).await {
                        debug!(%peer, %err, "matchmaking rpc failed");
                    }
                });
            }
            Err(err) => {
                warn!(%err, "matchmaking accept failed");
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    requests: mpsc::Sender<IncomingRequest>,
) -> io::Result<()> {
    let frame = read_frame(&mut stream).await?;
    let request = QuickMatchRequest::decode(frame.as_slice())
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

    let (reply_tx, reply_rx) = oneshot::channel();
    requests
        .send(IncomingRequest {
            request,
            reply: reply_tx,
        })
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "matchmaker is gone"))?;

    // The reply may take arbitrarily long: it arrives only once the
    // cohort fills and its match server is up.
    let reply = reply_rx
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "request dropped"))?;

    write_frame(&mut stream, &reply.encode_to_vec()).await
}
