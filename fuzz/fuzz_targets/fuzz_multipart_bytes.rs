#![no_main]

use std::convert::Infallible;

use futures_util::stream::once;
use libfuzzer_sys::fuzz_target;
use multiparser::bytes::Bytes;
use multiparser::Multipart;
use tokio::runtime;

fuzz_target!(|data: &[u8]| {
    let data = data.to_vec();
    let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });

    let mut multipart = Multipart::new(stream, "X-BOUNDARY");

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
