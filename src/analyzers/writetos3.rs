use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::io::Write;

/// Serializes a value to JSON and uploads it to an S3 bucket with
/// `application/json` content type, gzip-encoded when `gzip` is set.
pub async fn write_json_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    value: &impl Serialize,
    gzip: bool,
) -> anyhow::Result<()> {
    let body = serde_json::to_vec(value)?;

    let mut put = client
        .put_object()
        .bucket(bucket)
        .content_type("application/json");

    put = if gzip {
        put.key(format!("{key}.gz"))
            .content_encoding("gzip")
            .body(gzip_bytes(&body)?.into())
    } else {
        put.key(key).body(body.into())
    };

    put.send().await?;
    Ok(())
}

fn gzip_bytes(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}
