use mock_server::Upstream;
use tokio::net::TcpListener;

/// `STUB_REPLIES` may name a JSON file holding an array of assistant
/// replies, served in order by `/chat/completions`.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let replies: Vec<String> = match std::env::var("STUB_REPLIES") {
        Ok(path) => {
            let text = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str(&text)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
        }
        Err(_) => Vec::new(),
    };

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("listening on {addr} with {} scripted replies", replies.len());
    mock_server::run(listener, Upstream::with_replies(replies)).await
}
