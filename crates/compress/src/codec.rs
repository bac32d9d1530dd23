use crate::Compression;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use flate2::GzBuilder;
use flate2::read::MultiGzDecoder;
use std::io::{Read, Write};
use tracing::instrument;

// Assets are encoded once and served many times; always spend the CPU.
const GZIP_LEVEL: flate2::Compression = flate2::Compression::best();

impl Compression {
    /// Encode `input`. [`None`](Self::None) returns a copy.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachet_compress::Compression;
    ///
    /// let css = b"body { color: rebeccapurple }";
    /// let first = Compression::Gzip.compress(css).unwrap();
    /// assert_eq!(first, Compression::Gzip.compress(css).unwrap());
    /// assert_eq!(Compression::Gzip.decompress(&first).unwrap(), css);
    /// ```
    #[instrument(level = "trace", skip(input), fields(format = %self, input_size = input.len()))]
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(input.to_vec()),
            Self::Gzip => {
                // mtime 0 and no file name keep the header stable.
                let mut encoder = GzBuilder::new().mtime(0).write(Vec::with_capacity(input.len() / 2), GZIP_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Encode)?;
                encoder.finish().or_raise(|| ErrorKind::Encode)
            },
        }
    }

    /// Decode `input`. Concatenated gzip members are decoded as one body.
    #[instrument(level = "trace", skip(input), fields(format = %self, input_size = input.len()))]
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(input.to_vec()),
            Self::Gzip => {
                let mut output = Vec::with_capacity(input.len() * 4);
                MultiGzDecoder::new(input).read_to_end(&mut output).or_raise(|| ErrorKind::Decode)?;
                Ok(output)
            },
        }
    }
}
