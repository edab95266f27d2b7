use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::web;
use futures::StreamExt;
use hg_hub::Hub;
use hg_hub::Identity;
use hg_hub::ServerMessage;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

/// Upgrades the request and hands the socket to its own reader task.
pub async fn endpoint(
    hub: web::Data<Arc<Hub>>,
    req: HttpRequest,
    body: web::Payload,
) -> actix_web::Result<HttpResponse> {
    let (response, session, stream) = actix_ws::handle(&req, body)?;
    actix_web::rt::spawn(connection(Arc::clone(hub.get_ref()), session, stream));
    Ok(response)
}

/// One connection: a reader loop feeding the hub, and a writer task
/// draining this connection's mailbox onto the socket.
///
/// The connection starts unauthenticated; the hub gates everything but
/// register/login/refresh/auth until `auth` binds an identity. When the
/// socket drops, the hub tombstones the user if they were seated.
async fn connection(
    hub: Arc<Hub>,
    session: actix_ws::Session,
    mut stream: actix_ws::MessageStream,
) {
    let (tx, rx) = unbounded_channel::<ServerMessage>();
    actix_web::rt::spawn(write(session.clone(), rx));
    let mut identity: Option<Identity> = None;
    let mut control = session;
    while let Some(Ok(frame)) = stream.next().await {
        match frame {
            actix_ws::Message::Text(text) => {
                if let Some(reply) = hub.process(&mut identity, &tx, &text).await {
                    if tx.send(reply).is_err() {
                        break;
                    }
                }
                // a newer socket for the same user closes this one
                if hub.displaced(&identity, &tx).await {
                    break;
                }
            }
            actix_ws::Message::Ping(bytes) => {
                if control.pong(&bytes).await.is_err() {
                    break;
                }
            }
            actix_ws::Message::Close(_) => break,
            _ => {}
        }
    }
    hub.disconnect(&identity, &tx).await;
}


async fn write(
    mut session: actix_ws::Session,
    mut rx: tokio::sync::mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(message) = rx.recv().await {
        let text = serde_json::to_string(&message).expect("messages serialize");
        if session.text(text).await.is_err() {
            break;
        }
    }
    let _ = session.close(None).await;
}
