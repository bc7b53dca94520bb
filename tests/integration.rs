use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use http::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use multiparser::{Constraints, Error, Event, Multipart, SizeLimit};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BASIC: &str = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"My Field\"\r\n\r\nabcd\r\n--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"File Field\"; filename=\"a-text-file.txt\"\r\nContent-Type: text/plain\r\n\r\nHello world\nHello\r\nWorld\rAgain\r\n--X-BOUNDARY--\r\n";

fn char_stream(data: &'static str) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    stream::iter(
        data.chars()
            .map(|ch| ch.to_string())
            .map(|part| Ok(Bytes::copy_from_slice(part.as_bytes()))),
    )
}

fn sized_stream(data: &[u8], size: usize) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let chunks = data.chunks(size).map(Bytes::copy_from_slice).map(Ok).collect::<Vec<_>>();
    stream::iter(chunks)
}

async fn collect_parts(mut m: Multipart<'_>) -> multiparser::Result<Vec<(Option<String>, Option<String>, String)>> {
    let mut parts = Vec::new();

    while let Some(part) = m.next_part().await? {
        let name = part.name().map(|s| s.to_owned());
        let file_name = part.file_name().map(|s| s.to_owned());
        parts.push((name, file_name, part.text().await?));
    }

    Ok(parts)
}

#[tokio::test]
async fn test_multipart_basic() {
    let mut m = Multipart::new(char_stream(BASIC), "X-BOUNDARY");

    let part = m.next_part().await.unwrap().unwrap();
    assert_eq!(part.name(), Some("My Field"));
    assert_eq!(part.file_name(), None);
    assert_eq!(part.mime_type(), None);
    assert_eq!(part.content_type(), None);
    assert_eq!(part.index(), 0);
    assert_eq!(part.text().await, Ok("abcd".to_owned()));

    let part = m.next_part().await.unwrap().unwrap();
    assert_eq!(part.name(), Some("File Field"));
    assert_eq!(part.file_name(), Some("a-text-file.txt"));
    assert_eq!(part.mime_type(), Some("text/plain"));
    assert_eq!(part.content_type(), Some(mime::TEXT_PLAIN));
    assert_eq!(part.headers().get("content-type").unwrap(), "text/plain");
    assert_eq!(part.index(), 1);
    assert_eq!(part.text().await, Ok("Hello world\nHello\r\nWorld\rAgain".to_owned()));

    assert!(m.next_part().await.unwrap().is_none());
    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_events() {
    let data = "--AaB03x\r\nContent-Disposition: form-data; name=\"submit-name\"\r\n\r\nLarry\r\n--AaB03x\r\nContent-Disposition: form-data; name=\"files\"; filename=\"file1.txt\"\r\nContent-Type: text/plain\r\n\r\n... contents of file1.txt ...\r\n--AaB03x--";
    let mut m = Multipart::new(sized_stream(data.as_bytes(), data.len()), "AaB03x");

    let mut parts = Vec::new();
    let mut ended = false;

    while let Some(event) = m.next().await {
        assert!(!ended, "event after end");
        match event {
            Event::Progress { parsed, total } => {
                assert_eq!(parsed, data.len() as u64);
                assert_eq!(total, None);
            }
            Event::Part(part) => {
                let name = part.name().map(|s| s.to_owned());
                let file_name = part.file_name().map(|s| s.to_owned());
                parts.push((name, file_name, part.text().await.unwrap()));
            }
            Event::Error(err) => panic!("unexpected error: {}", err),
            Event::End => ended = true,
        }
    }

    assert!(ended);
    assert_eq!(
        parts,
        vec![
            (Some("submit-name".to_owned()), None, "Larry".to_owned()),
            (
                Some("files".to_owned()),
                Some("file1.txt".to_owned()),
                "... contents of file1.txt ...".to_owned()
            ),
        ]
    );
}

#[tokio::test]
async fn test_multipart_single_field() {
    let data = "--AaB03x\r\nContent-Disposition: form-data; name=\"field1\"\r\n\r\nvalue1\r\n--AaB03x--";

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("multipart/form-data; boundary=AaB03x"),
    );

    let mut m = Multipart::from_headers(&headers, char_stream(data)).unwrap();

    let part = m.next_part().await.unwrap().unwrap();
    assert_eq!(part.name(), Some("field1"));
    assert_eq!(part.file_name(), None);
    assert_eq!(part.bytes().await.unwrap(), Bytes::from_static(b"value1"));

    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_any_chunking() {
    let expected = vec![
        (Some("My Field".to_owned()), None, "abcd".to_owned()),
        (
            Some("File Field".to_owned()),
            Some("a-text-file.txt".to_owned()),
            "Hello world\nHello\r\nWorld\rAgain".to_owned(),
        ),
    ];

    for size in 1..=BASIC.len() {
        let m = Multipart::new(sized_stream(BASIC.as_bytes(), size), "X-BOUNDARY");
        assert_eq!(collect_parts(m).await.unwrap(), expected, "chunk size {}", size);
    }
}

#[tokio::test]
async fn test_multipart_payload_resembling_boundary() {
    let payload = "\r\n--X-BOUNDAR\r\n--X-BOUNDARYx--X-BOUNDARY\r\r\n-\r\n--X-BOUNDARY-y\r";
    let data = format!(
        "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"tricky\"\r\n\r\n{}\r\n--X-BOUNDARY--\r\n",
        payload
    );

    for size in &[1, 2, 5, 13, 64, data.len()] {
        let m = Multipart::new(sized_stream(data.as_bytes(), *size), "X-BOUNDARY");
        let parts = collect_parts(m).await.unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].2, payload, "chunk size {}", size);
    }
}

#[tokio::test]
async fn test_multipart_binary_payload() {
    let payload = (0..20_000u32).map(|n| (n * 7 % 256) as u8).collect::<Vec<_>>();

    let mut data = b"--bin\r\nContent-Disposition: form-data; name=\"blob\"; filename=\"blob.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n".to_vec();
    data.extend_from_slice(&payload);
    data.extend_from_slice(b"\r\n--bin--\r\n");

    for size in &[7, 1024, 4096, data.len()] {
        let mut m = Multipart::new(sized_stream(&data, *size), "bin");

        let part = m.next_part().await.unwrap().unwrap();
        assert_eq!(part.file_name(), Some("blob.bin"));
        assert_eq!(part.content_type(), Some(mime::APPLICATION_OCTET_STREAM));
        assert_eq!(part.bytes().await.unwrap(), Bytes::from(payload.clone()));

        assert!(m.next_part().await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_multipart_progress() {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("multipart/form-data; boundary=X-BOUNDARY"),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(BASIC.len()));

    let mut m = Multipart::from_headers(&headers, sized_stream(BASIC.as_bytes(), 10)).unwrap();

    let mut last = 0;
    let mut parts = 0;

    while let Some(event) = m.next_event().await {
        match event {
            Event::Progress { parsed, total } => {
                assert!(parsed > last);
                assert_eq!(total, Some(BASIC.len() as u64));
                last = parsed;
            }
            Event::Part(part) => {
                part.bytes().await.unwrap();
                parts += 1;
            }
            Event::Error(err) => panic!("unexpected error: {}", err),
            Event::End => break,
        }
    }

    assert_eq!(parts, 2);
    assert_eq!(last, BASIC.len() as u64);
    assert!(m.next_event().await.is_none());
}

#[tokio::test]
async fn test_multipart_progress_counts_whole_body() {
    let mut m = Multipart::new(char_stream(BASIC), "X-BOUNDARY");

    let mut last = 0;
    while let Some(event) = m.next_event().await {
        match event {
            Event::Progress { parsed, .. } => last = parsed,
            Event::Part(part) => {
                part.bytes().await.unwrap();
            }
            Event::Error(err) => panic!("unexpected error: {}", err),
            Event::End => break,
        }
    }
    assert_eq!(last, BASIC.len() as u64);

    let data = "--X\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--X--\r\nsome epilogue";
    let mut m = Multipart::new(sized_stream(data.as_bytes(), 3), "X");

    let mut last = 0;
    let mut texts = Vec::new();
    while let Some(event) = m.next_event().await {
        match event {
            Event::Progress { parsed, .. } => last = parsed,
            Event::Part(part) => texts.push(part.text().await.unwrap()),
            Event::Error(err) => panic!("unexpected error: {}", err),
            Event::End => break,
        }
    }
    assert_eq!(texts, vec!["1".to_owned()]);
    assert_eq!(last, data.len() as u64);
}

#[tokio::test]
async fn test_multipart_progress_with_invalid_content_length() {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("multipart/form-data; boundary=X-BOUNDARY"),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from_static("abc"));

    let mut m = Multipart::from_headers(&headers, sized_stream(BASIC.as_bytes(), 50)).unwrap();

    let mut progress = 0;
    while let Some(event) = m.next_event().await {
        match event {
            Event::Progress { total, .. } => {
                assert_eq!(total, None);
                progress += 1;
            }
            Event::Part(part) => {
                part.bytes().await.unwrap();
            }
            Event::Error(err) => panic!("unexpected error: {}", err),
            Event::End => break,
        }
    }
    assert!(progress > 0);
}

#[tokio::test]
async fn test_multipart_empty_boundary() {
    let polled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&polled);
    let stream = char_stream(BASIC).inspect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let mut m = Multipart::new(stream, "");

    assert!(matches!(m.next_event().await, Some(Event::Error(Error::NoBoundary))));
    assert!(matches!(m.next_event().await, Some(Event::End)));
    assert!(m.next_event().await.is_none());
    assert_eq!(polled.load(Ordering::SeqCst), 0);

    let mut m = Multipart::with_constraints(char_stream(BASIC), String::new(), Constraints::new());
    assert_eq!(m.next_part().await.unwrap_err(), Error::NoBoundary);
    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_from_headers_config_errors() {
    let mut headers = HeaderMap::new();
    let result = Multipart::from_headers(&headers, char_stream(BASIC));
    assert_eq!(result.err(), Some(Error::NoMultipart));

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let result = Multipart::from_headers(&headers, char_stream(BASIC));
    assert_eq!(result.err(), Some(Error::NoMultipart));

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("multipart/form-data"));
    let result = Multipart::from_headers(&headers, char_stream(BASIC));
    assert_eq!(result.err(), Some(Error::NoBoundary));

    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("multipart/form-data; boundary=\"X-BOUNDARY\""),
    );
    let m = Multipart::from_headers(&headers, char_stream(BASIC)).unwrap();
    assert_eq!(collect_parts(m).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_multipart_without_parts() {
    let mut m = Multipart::new(char_stream("--X-BOUNDARY--\r\n"), "X-BOUNDARY");

    assert_eq!(
        m.next_part().await.unwrap_err(),
        Error::ParseFailed {
            state: "StartBoundary",
            offset: 12
        }
    );
    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_missing_closing_boundary() {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"cut\"\r\n\r\nabc";
    let mut m = Multipart::new(char_stream(data), "X-BOUNDARY");

    let part = m.next_part().await.unwrap().unwrap();
    assert_eq!(
        part.text().await.unwrap_err(),
        Error::IncompletePartData {
            part_name: Some("cut".to_owned())
        }
    );

    assert_eq!(m.next_part().await.unwrap_err(), Error::IncompleteStream);
    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_transport_error() {
    let chunks = vec![
        Ok(Bytes::from_static(
            b"--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"upload\"\r\n\r\nabc",
        )),
        Err(std::io::Error::new(std::io::ErrorKind::Other, "connection reset")),
    ];
    let mut m = Multipart::new(stream::iter(chunks), "X-BOUNDARY");

    let mut part = m.next_part().await.unwrap().unwrap();
    assert_eq!(part.chunk().await.unwrap(), Some(Bytes::from_static(b"abc")));
    assert_eq!(
        part.chunk().await.unwrap_err(),
        Error::IncompletePartData {
            part_name: Some("upload".to_owned())
        }
    );
    assert_eq!(part.chunk().await.unwrap(), None);

    let err = m.next_part().await.unwrap_err();
    assert!(matches!(err, Error::StreamReadFailed(_)));
    assert_eq!(err.to_string(), "stream read failed: connection reset");
    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_invalid_header_value() {
    let data = "--X\r\nContent-Disposition: form-data; name=\"ok\"\r\n\r\nfine\r\n--X\r\nX-Bad: a\x01b\r\n\r\nrest\r\n--X--";
    let mut m = Multipart::new(sized_stream(data.as_bytes(), data.len()), "X");

    let first = m.next_part().await.unwrap().unwrap();
    assert_eq!(first.name(), Some("ok"));
    assert!(matches!(m.next_part().await, Err(Error::DecodeHeaderValue { .. })));
    assert_eq!(first.text().await.unwrap(), "fine");
    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_cr_in_header_name() {
    let data = "--b\r\nX-A\r\n\r\nv\r\n--b--";
    let mut m = Multipart::new(sized_stream(data.as_bytes(), data.len()), "b");

    let part = m.next_part().await.unwrap().unwrap();
    assert_eq!(part.name(), None);
    assert!(part.headers().is_empty());
    assert_eq!(part.text().await.unwrap(), "\r\nv");
    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_error_keeps_finished_parts() {
    let data = "--X\r\nContent-Disposition: form-data; name=\"done\"\r\n\r\nkept\r\n--X\r\nBad Header: x\r\n\r\n";
    let mut m = Multipart::new(sized_stream(data.as_bytes(), data.len()), "X");

    let done = m.next_part().await.unwrap().unwrap();
    assert!(matches!(
        m.next_part().await.unwrap_err(),
        Error::ParseFailed { state: "HeaderField", .. }
    ));
    assert_eq!(done.text().await.unwrap(), "kept");
    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_per_part_size_limit() {
    let constraints = Constraints::new().size_limit(SizeLimit::new().per_part(3));
    let mut m = Multipart::with_constraints(char_stream(BASIC), "X-BOUNDARY", constraints);

    let mut part = m.next_part().await.unwrap().unwrap();
    let mut received = Vec::new();
    let err = loop {
        match part.chunk().await {
            Ok(Some(chunk)) => received.extend_from_slice(&chunk),
            Ok(None) => panic!("part ended within its limit"),
            Err(err) => break err,
        }
    };
    assert_eq!(
        err,
        Error::IncompletePartData {
            part_name: Some("My Field".to_owned())
        }
    );
    assert_eq!(received, b"abc");
    assert_eq!(part.bytes_loaded(), 3);
    assert_eq!(
        m.next_part().await.unwrap_err(),
        Error::PartSizeExceeded {
            limit: 3,
            part_name: Some("My Field".to_owned())
        }
    );
    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_named_part_size_limit() {
    let constraints = Constraints::new().size_limit(SizeLimit::new().per_part(4).for_part("File Field", 100));
    let m = Multipart::with_constraints(char_stream(BASIC), "X-BOUNDARY", constraints);

    assert_eq!(collect_parts(m).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_multipart_whole_stream_size_limit() {
    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(10));
    let mut m = Multipart::with_constraints(char_stream(BASIC), "X-BOUNDARY", constraints);

    assert_eq!(
        m.next_part().await.unwrap_err(),
        Error::StreamSizeExceeded { limit: 10 }
    );
    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_header_encoding() {
    let mut data = b"--X\r\nContent-Disposition: form-data; name=\"f\"; filename=\"caf".to_vec();
    data.push(0xE9);
    data.extend_from_slice(b".txt\"\r\n\r\nx\r\n--X--");

    let constraints = Constraints::new().header_encoding(encoding_rs::WINDOWS_1252);
    let mut m = Multipart::with_constraints(sized_stream(&data, 4), "X", constraints);

    let part = m.next_part().await.unwrap().unwrap();
    assert_eq!(part.file_name(), Some("café.txt"));
    assert_eq!(part.text().await.unwrap(), "x");
}

#[tokio::test]
async fn test_multipart_skips_dropped_part() {
    let mut m = Multipart::new(char_stream(BASIC), "X-BOUNDARY");

    let part = m.next_part().await.unwrap().unwrap();
    assert_eq!(part.name(), Some("My Field"));
    drop(part);

    let part = m.next_part().await.unwrap().unwrap();
    assert_eq!(part.name(), Some("File Field"));
    assert_eq!(part.text().await.unwrap(), "Hello world\nHello\r\nWorld\rAgain");

    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_part_progress() {
    let mut m = Multipart::new(char_stream(BASIC), "X-BOUNDARY");

    let mut part = m.next_part().await.unwrap().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    part.on_progress(move |loaded| sink.lock().unwrap().push(loaded));

    while part.chunk().await.unwrap().is_some() {}

    assert_eq!(part.bytes_loaded(), 4);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_multipart_backpressure_stops_pulling() {
    let payload = "x".repeat(64);
    let data = format!(
        "--b\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n{}\r\n--b--",
        payload
    );

    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pulled);
    let stream = sized_stream(data.as_bytes(), 8).inspect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let constraints = Constraints::new().high_water_mark(8);
    let mut m = Multipart::with_constraints(stream, "b", constraints);

    let part = m.next_part().await.unwrap().unwrap();
    assert_eq!(pulled.load(Ordering::SeqCst), 7);

    // The part holds 15 unread bytes, so the parser waits for its reader.
    let waited = tokio::time::timeout(Duration::from_millis(50), m.next_part()).await;
    assert!(waited.is_err());
    assert_eq!(pulled.load(Ordering::SeqCst), 8);

    assert_eq!(part.text().await.unwrap(), payload);
    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_backpressure_keeps_order() {
    let mut data = String::new();
    for idx in 0..5 {
        data.push_str(&format!(
            "--b\r\nContent-Disposition: form-data; name=\"part{}\"\r\n\r\n{}\r\n",
            idx,
            idx.to_string().repeat(100)
        ));
    }
    data.push_str("--b--\r\n");

    for size in &[1, 9, data.len()] {
        let constraints = Constraints::new().high_water_mark(1);
        let m = Multipart::with_constraints(sized_stream(data.as_bytes(), *size), "b", constraints);

        let parts = collect_parts(m).await.unwrap();
        assert_eq!(parts.len(), 5);
        for (idx, (name, _, text)) in parts.into_iter().enumerate() {
            assert_eq!(name, Some(format!("part{}", idx)));
            assert_eq!(text, idx.to_string().repeat(100));
        }
    }
}

#[tokio::test]
async fn test_multipart_end_waits_for_parts() {
    let mut m = Multipart::new(sized_stream(BASIC.as_bytes(), BASIC.len()), "X-BOUNDARY");

    let mut parts = Vec::new();
    while parts.len() < 2 {
        match m.next_event().await {
            Some(Event::Part(part)) => parts.push(part),
            Some(Event::Progress { .. }) => {}
            other => panic!("unexpected event: {:?}", other),
        }
    }

    let waited = tokio::time::timeout(Duration::from_millis(50), m.next_event()).await;
    assert!(waited.is_err());

    for part in parts {
        part.bytes().await.unwrap();
    }

    assert!(matches!(m.next_event().await, Some(Event::End)));
    assert!(m.next_event().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_multipart_concurrent_readers() {
    let mut data = Vec::new();
    for idx in 0..4u8 {
        data.extend_from_slice(format!("--b\r\nContent-Disposition: form-data; name=\"f{}\"\r\n\r\n", idx).as_bytes());
        data.extend(std::iter::repeat(b'a' + idx).take(5000));
        data.extend_from_slice(b"\r\n");
    }
    data.extend_from_slice(b"--b--\r\n");

    let constraints = Constraints::new().high_water_mark(256);
    let mut m = Multipart::with_constraints(sized_stream(&data, 100), "b", constraints);

    let mut readers = Vec::new();
    while let Some(part) = m.next_part().await.unwrap() {
        readers.push(tokio::spawn(async move {
            let name = part.name().map(|s| s.to_owned());
            (name, part.bytes().await.unwrap())
        }));
    }

    for (idx, reader) in readers.into_iter().enumerate() {
        let (name, bytes) = reader.await.unwrap();
        assert_eq!(name, Some(format!("f{}", idx)));
        assert_eq!(bytes.len(), 5000);
        assert!(bytes.iter().all(|&b| b == b'a' + idx as u8));
    }
}

#[tokio::test]
async fn test_multipart_drop_releases_parts() {
    let mut m = Multipart::new(sized_stream(BASIC.as_bytes(), BASIC.len()), "X-BOUNDARY");

    let part = m.next_part().await.unwrap().unwrap();
    drop(m);

    assert_eq!(part.text().await.unwrap(), "abcd");
}

#[tokio::test]
async fn test_multipart_leading_newlines_and_epilogue() {
    let data = "\r\n\r\n--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--X-BOUNDARY--\r\nthis is ignored";
    let m = Multipart::new(char_stream(data), "X-BOUNDARY");

    assert_eq!(collect_parts(m).await.unwrap(), vec![(Some("a".to_owned()), None, "1".to_owned())]);
}

#[cfg(feature = "json")]
#[tokio::test]
async fn test_part_json() {
    #[derive(serde::Deserialize, PartialEq, Debug)]
    struct Payload {
        id: u32,
        tags: Vec<String>,
    }

    let data = "--X\r\nContent-Disposition: form-data; name=\"meta\"\r\nContent-Type: application/json\r\n\r\n{\"id\":7,\"tags\":[\"a\",\"b\"]}\r\n--X--";
    let mut m = Multipart::new(char_stream(data), "X");

    let part = m.next_part().await.unwrap().unwrap();
    assert_eq!(
        part.json::<Payload>().await.unwrap(),
        Payload {
            id: 7,
            tags: vec!["a".to_owned(), "b".to_owned()]
        }
    );
}

#[cfg(feature = "tokio-io")]
#[tokio::test]
async fn test_multipart_with_reader() {
    let mut m = Multipart::with_reader(BASIC.as_bytes(), "X-BOUNDARY");

    let mut names = Vec::new();
    while let Some(part) = m.next_part().await.unwrap() {
        names.push(part.name().map(|s| s.to_owned()));
    }

    assert_eq!(names, vec![Some("My Field".to_owned()), Some("File Field".to_owned())]);
}
