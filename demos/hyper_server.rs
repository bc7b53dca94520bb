use std::{convert::Infallible, net::SocketAddr};

use bytes::Bytes;
use futures_util::StreamExt;
use http_body_util::{BodyStream, Full};
use hyper::{body::Incoming, Method, Request, Response, StatusCode};
// Import the multiparser types.
use multiparser::{Event, Multipart};
use tokio::io::AsyncWriteExt;

const FORM: &str = r#"<html>
<form enctype="multipart/form-data" method="POST" action="/upload">
<input name="fieldup" type="text" /><br>
<input name="fileup" type="file" multiple="true" /><br>
<input type="submit" value="upload" />
</form>
</html>"#;

// A handler for incoming requests.
async fn handle(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::POST || req.uri().path() != "/upload" {
        return Ok(Response::new(Full::from(FORM)));
    }

    let (parts, body) = req.into_parts();

    // Convert the body into a stream of data frames.
    let body_stream = BodyStream::new(body)
        .filter_map(|result| async move { result.map(|frame| frame.into_data().ok()).transpose() });

    // The boundary and the total length come from the request headers.
    let multipart = match Multipart::from_headers(&parts.headers, body_stream) {
        Ok(multipart) => multipart,
        Err(err) => {
            return Ok(Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Full::from(format!("BAD REQUEST: {}", err)))
                .unwrap());
        }
    };

    // Process the multipart e.g. you can store the files on disk.
    if let Err(err) = process_multipart(multipart).await {
        return Ok(Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::from(format!("INTERNAL SERVER ERROR: {}", err)))
            .unwrap());
    }

    Ok(Response::new(Full::from("all parsed!")))
}

// Process the request body as multipart/form-data.
async fn process_multipart(mut multipart: Multipart<'static>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let upload_dir = std::env::temp_dir();
    let mut percent = 0;
    let mut failure = None;

    // Iterate over the events, `Event::End` is always the last one.
    while let Some(event) = multipart.next_event().await {
        match event {
            Event::Progress { parsed, total } => {
                if let Some(total) = total.filter(|&total| total > 0) {
                    let current = parsed * 100 / total;
                    if current != percent {
                        println!("uploading... {}%", current);
                        percent = current;
                    }
                }
            }
            Event::Part(mut part) => {
                let name = part.name().map(|s| s.to_owned());

                match part.file_name().map(|s| s.to_owned()) {
                    Some(file_name) if !file_name.is_empty() => {
                        let path = upload_dir.join(&file_name);
                        let mut file = tokio::fs::File::create(&path).await?;

                        // Write the payload chunk by chunk, the parser waits while we do.
                        while let Some(chunk) = part.chunk().await? {
                            file.write_all(&chunk).await?;
                        }

                        println!("uploaded file {:?} to {}", name, path.display());
                    }
                    _ => {
                        let value = part.text().await?;
                        println!("parsed field {:?} as {:?}", name, value);
                    }
                }
            }
            Event::Error(err) => failure = Some(err),
            Event::End => break,
        }
    }

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let addr = SocketAddr::from(([127, 0, 0, 1], 8080));
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    println!("Server running at: {}", addr);

    let service = hyper::service::service_fn(handle);

    loop {
        let (socket, _remote_addr) = listener.accept().await.unwrap();
        let socket = hyper_util::rt::TokioIo::new(socket);
        tokio::spawn(async move {
            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(socket, service)
                .await
            {
                eprintln!("server error: {}", e);
            }
        });
    }
}
