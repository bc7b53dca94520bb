use multiparser::{Constraints, Multipart};
use tokio::io::AsyncRead;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Generate an `AsyncRead` and the boundary from somewhere e.g. server request body.
    let (reader, boundary) = get_async_reader_from_somewhere().await;

    // Keep at most 4 unread bytes per part before the parser waits for us.
    let constraints = Constraints::new().high_water_mark(4);

    // Create a `Multipart` instance from that async reader and the boundary.
    let mut multipart = Multipart::with_reader_with_constraints(reader, boundary, constraints);

    // Iterate over the parts, use `next_part()` to get the next part.
    while let Some(mut part) = multipart.next_part().await? {
        println!("Name: {:?}, File Name: {:?}", part.name(), part.file_name());

        part.on_progress(|loaded| println!("  {} bytes loaded", loaded));

        // Read the payload chunk by chunk.
        while let Some(chunk) = part.chunk().await? {
            println!("  Chunk: {:?}", chunk);
        }
    }

    Ok(())
}

// Generate an `AsyncRead` and the boundary from somewhere e.g. server request body.
async fn get_async_reader_from_somewhere() -> (impl AsyncRead, &'static str) {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"My Field\"\r\n\r\nabcd\r\n--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"File Field\"; filename=\"a-text-file.txt\"\r\nContent-Type: text/plain\r\n\r\nHello world\nHello\r\nWorld\rAgain\r\n--X-BOUNDARY--\r\n";

    (data.as_bytes(), "X-BOUNDARY")
}
