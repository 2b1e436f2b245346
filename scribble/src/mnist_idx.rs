use anyhow::anyhow;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::Array3;
use std::io::{Read, Write};

/// IDX image container magic: unsigned byte payload, 3 dimensions
pub const IDX_IMAGE_MAGIC: u32 = 0x0000_0803;

///
/// Read a stack of grayscale images from an IDX image file
/// (`train-images-idx3-ubyte` and friends). Files ending in `.gz` are
/// decompressed transparently.
///
/// Returns pixels as `(num_images, num_rows, num_cols)`.
///
pub fn read_idx_images(file_path: &str) -> anyhow::Result<Array3<u8>> {
    let bytes = read_file_bytes(file_path)?;

    let magic = be_u32(&bytes, 0)?;
    if magic != IDX_IMAGE_MAGIC {
        return Err(anyhow!(
            "unexpected magic {:#010x} in {} (want an IDX image file)",
            magic,
            file_path
        ));
    }

    let num_images = be_u32(&bytes, 4)? as usize;
    let num_rows = be_u32(&bytes, 8)? as usize;
    let num_cols = be_u32(&bytes, 12)? as usize;

    let pixels = bytes
        .get(16..(16 + num_images * num_rows * num_cols))
        .ok_or_else(|| anyhow!("truncated pixel payload in {}", file_path))?;

    Ok(Array3::from_shape_vec(
        (num_images, num_rows, num_cols),
        pixels.to_vec(),
    )?)
}

///
/// Write a stack of grayscale images as an IDX image file; `.gz` output
/// paths are gzip-compressed.
///
pub fn write_idx_images(images: &Array3<u8>, file_path: &str) -> anyhow::Result<()> {
    let (num_images, num_rows, num_cols) = images.dim();

    let mut bytes = Vec::with_capacity(16 + num_images * num_rows * num_cols);
    bytes.extend_from_slice(&IDX_IMAGE_MAGIC.to_be_bytes());
    bytes.extend_from_slice(&(num_images as u32).to_be_bytes());
    bytes.extend_from_slice(&(num_rows as u32).to_be_bytes());
    bytes.extend_from_slice(&(num_cols as u32).to_be_bytes());
    bytes.extend(images.iter().copied());

    if file_path.ends_with(".gz") {
        let file = std::fs::File::create(file_path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?;
    } else {
        std::fs::write(file_path, &bytes)?;
    }

    Ok(())
}

fn read_file_bytes(file_path: &str) -> anyhow::Result<Vec<u8>> {
    let raw = std::fs::read(file_path)?;

    if file_path.ends_with(".gz") {
        let mut bytes = Vec::new();
        GzDecoder::new(&raw[..]).read_to_end(&mut bytes)?;
        Ok(bytes)
    } else {
        Ok(raw)
    }
}

fn be_u32(bytes: &[u8], offset: usize) -> anyhow::Result<u32> {
    let chunk: [u8; 4] = bytes
        .get(offset..(offset + 4))
        .ok_or_else(|| anyhow!("truncated IDX header"))?
        .try_into()?;

    Ok(u32::from_be_bytes(chunk))
}
