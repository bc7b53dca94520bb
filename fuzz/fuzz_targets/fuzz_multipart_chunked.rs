#![no_main]

use std::convert::Infallible;

use futures_util::stream::iter;
use libfuzzer_sys::fuzz_target;
use multiparser::bytes::Bytes;
use multiparser::{Constraints, Multipart};
use tokio::runtime;

// The first byte picks the chunk size, the rest is the body.
fuzz_target!(|data: &[u8]| {
    let (size, body) = match data.split_first() {
        Some((size, body)) => (usize::from(*size).max(1), body),
        None => return,
    };

    let chunks = body
        .chunks(size)
        .map(|chunk| Result::<Bytes, Infallible>::Ok(Bytes::copy_from_slice(chunk)))
        .collect::<Vec<_>>();

    let constraints = Constraints::new().high_water_mark(size / 2);
    let mut multipart = Multipart::with_constraints(iter(chunks), "X-BOUNDARY", constraints);

    let rt = runtime::Builder::new_current_thread().build().expect("runtime");
    rt.block_on(async {
        loop {
            match multipart.next_part().await {
                Ok(Some(part)) => {
                    let _ = part.bytes().await;
                }
                Err(_) => continue,
                Ok(None) => break,
            }
        }
    })
});
