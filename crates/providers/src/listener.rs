//! Loopback listener for redirect-style OAuth callbacks.
//!
//! The backend finishes a provider authorization by redirecting the browser
//! to `http://localhost:<port>/callback?...`; this listener accepts that one
//! request, hands the raw query string to the bridge, and shows the user a
//! small confirmation page.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::time::{Duration, Instant};

use shared::error::ContextError;

fn io_err(e: std::io::Error) -> ContextError {
    ContextError::network(e.to_string())
}

const CALLBACK_PAGE: &str = "HTTP/1.1 200 OK\r\n\
Content-Type: text/html\r\n\r\n\
<html><body>\
<h1>Authorization received</h1>\
<p>You can close this window and return to The Context File.</p>\
</body></html>";

pub struct RedirectListener {
    listener: TcpListener,
    port: u16,
}

impl RedirectListener {
    /// Try a few ports in case the first is busy.
    pub fn bind() -> Result<Self, ContextError> {
        let ports = [8765, 8766, 8767, 18765, 28765];
        for port in ports {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok(Self { listener, port });
            }
        }
        Err(ContextError::network(
            "could not bind a callback listener on any port",
        ))
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn redirect_url(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }

    /// Block until one redirect arrives or the deadline passes. Returns the
    /// raw query string of the callback request.
    pub fn wait_for_redirect(&self, timeout: Duration) -> Result<String, ContextError> {
        self.listener.set_nonblocking(true).map_err(io_err)?;
        let deadline = Instant::now() + timeout;

        loop {
            match self.listener.accept() {
                Ok((mut stream, _)) => {
                    stream.set_nonblocking(false).map_err(io_err)?;
                    stream
                        .set_read_timeout(Some(Duration::from_secs(5)))
                        .map_err(io_err)?;

                    let mut reader = BufReader::new(&stream);
                    let mut request_line = String::new();
                    reader.read_line(&mut request_line).map_err(io_err)?;

                    let target = request_line
                        .split_whitespace()
                        .nth(1)
                        .ok_or_else(|| ContextError::network("malformed callback request"))?;
                    let query = target.split_once('?').map(|(_, q)| q).unwrap_or("");

                    stream
                        .write_all(CALLBACK_PAGE.as_bytes())
                        .and_then(|_| stream.flush())
                        .map_err(io_err)?;

                    return Ok(query.to_string());
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if Instant::now() > deadline {
                        return Err(ContextError::network(
                            "authorization callback timed out, please try again",
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(200));
                }
                Err(e) => return Err(ContextError::network(format!("callback accept failed: {}", e))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpStream;

    #[test]
    fn test_redirect_query_is_captured() {
        let listener = RedirectListener::bind().unwrap();
        let port = listener.port();

        let client = std::thread::spawn(move || {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
            stream
                .write_all(b"GET /callback?slack_success=true&session=S1 HTTP/1.1\r\n\r\n")
                .unwrap();
            let mut body = String::new();
            let _ = stream.read_to_string(&mut body);
            body
        });

        let query = listener.wait_for_redirect(Duration::from_secs(5)).unwrap();
        assert_eq!(query, "slack_success=true&session=S1");

        let body = client.join().unwrap();
        assert!(body.contains("Authorization received"));
    }

    #[test]
    fn test_wait_times_out_without_a_callback() {
        let listener = RedirectListener::bind().unwrap();
        let err = listener
            .wait_for_redirect(Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, ContextError::Network { .. }));
    }

    #[test]
    fn test_redirect_url_names_the_bound_port() {
        let listener = RedirectListener::bind().unwrap();
        assert_eq!(
            listener.redirect_url(),
            format!("http://localhost:{}/callback", listener.port())
        );
    }
}
