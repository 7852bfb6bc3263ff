#![doc = include_str!("../README.md")]

use std::{
    io::{Read as _, Write as _},
    net::TcpListener,
    thread::{self, JoinHandle},
};

use log::debug;
use url::Url;

/// A response the server answers one request with
#[derive(Clone, Debug)]
pub struct CannedResponse {
    status: u16,
    body: Vec<u8>,
}

/// Creates a response with the given status code and body
#[must_use]
pub fn respond(status: u16, body: &[u8]) -> CannedResponse {
    CannedResponse {
        status,
        body: body.to_vec(),
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// A server running in a background thread
#[derive(Debug)]
pub struct TestServer {
    url: Url,
    handle: JoinHandle<Vec<String>>,
}

impl TestServer {
    /// Returns the server root URL, `http://<address>/`
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Waits for every response to be served, and returns the request lines received
    ///
    /// # Panics
    ///
    /// Panics if the server thread panicked
    #[must_use]
    pub fn join(self) -> Vec<String> {
        self.handle.join().expect("Server thread panicked")
    }
}

/// Starts a server answering each connection with the next response of the list, in order.
///
/// The responses carry a `Content-Length` header. `HEAD` requests get the headers only.
///
/// # Panics
///
/// Panics if the server can't listen on the loopback interface, or if a connection fails
#[must_use]
pub fn serve(responses: Vec<CannedResponse>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Couldn't bind the test server");
    let addr = listener
        .local_addr()
        .expect("Couldn't retrieve the test server address");

    let handle = thread::spawn(move || {
        let mut requests = Vec::new();

        for response in responses {
            let (mut stream, _) = listener.accept().expect("Couldn't accept a connection");

            let mut request = Vec::new();
            let mut buf = [0_u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let count = stream.read(&mut buf).expect("Couldn't read the request");
                if count == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..count]);
            }

            let request = String::from_utf8_lossy(&request);
            let request_line = request.lines().next().unwrap_or_default().to_owned();
            debug!("Test server got {request_line}");

            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                response.status,
                reason(response.status),
                response.body.len()
            );

            stream
                .write_all(head.as_bytes())
                .expect("Couldn't write the response headers");

            if !request_line.starts_with("HEAD ") {
                stream
                    .write_all(&response.body)
                    .expect("Couldn't write the response body");
            }

            stream.flush().expect("Couldn't flush the response");
            requests.push(request_line);
        }

        requests
    });

    TestServer {
        url: Url::parse(&format!("http://{addr}/")).expect("Server URL is valid"),
        handle,
    }
}
