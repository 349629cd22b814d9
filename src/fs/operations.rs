use anyhow::Result;
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite};

/// Seeks backwards from the current position to the start of the previous
/// line. The append protocol uses this to position the cursor on the last
/// stored record so it can be rewritten in place.
///
/// A file without a trailing newline treats everything after the last `\n`
/// as the line to land on. Seeking from the start of the file is a no-op.
pub async fn seek_line_backwards(
    file: &mut (impl AsyncSeek + AsyncWrite + AsyncRead + Unpin),
    buffer: &mut [u8],
) -> Result<(), io::Error> {
    // The newline directly behind the cursor terminates the line we want to
    // land on, so the first scan ignores it. Otherwise a cursor sitting at
    // the end of a complete record would never move.
    let mut skip_terminator = 1usize;
    loop {
        let remaining = file.stream_position().await?;
        if remaining == 0 {
            return Ok(());
        }
        let chunk = u64::min(remaining, buffer.len() as u64) as usize;
        file.seek(std::io::SeekFrom::Current(-(chunk as i64))).await?;

        file.read_exact(&mut buffer[..chunk]).await?;
        for (index, value) in buffer[..chunk].iter().rev().enumerate().skip(skip_terminator) {
            if *value == b'\n' {
                file.seek(std::io::SeekFrom::Current(-(index as i64))).await?;
                return Ok(());
            }
        }

        skip_terminator = skip_terminator.saturating_sub(1);
        file.seek(std::io::SeekFrom::Current(-(chunk as i64))).await?;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use tempfile::tempfile;
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    use crate::fs::operations::seek_line_backwards;

    const RECORDS: &str = concat!(
        "{\"start\":1741338000,\"duration\":60,\"active\":true}\n",
        "{\"start\":1741338120,\"duration\":0,\"active\":false}\n",
    );

    async fn file_with(contents: &str) -> Result<tokio::fs::File> {
        let mut file = tempfile()?;
        file.write_all(contents.as_bytes())?;
        let mut file = tokio::fs::File::from_std(file);
        file.seek(std::io::SeekFrom::End(0)).await?;
        Ok(file)
    }

    async fn rest_of_file(file: &mut tokio::fs::File) -> Result<String> {
        let mut rest = String::new();
        file.read_to_string(&mut rest).await?;
        Ok(rest)
    }

    #[tokio::test]
    async fn lands_on_last_record() -> Result<()> {
        let mut file = file_with(RECORDS).await?;

        seek_line_backwards(&mut file, &mut vec![0; 1024]).await?;

        let rest = rest_of_file(&mut file).await?;
        assert_eq!(rest, "{\"start\":1741338120,\"duration\":0,\"active\":false}\n");
        Ok(())
    }

    #[tokio::test]
    async fn repeated_seeks_walk_towards_the_start() -> Result<()> {
        let mut file = file_with(RECORDS).await?;

        seek_line_backwards(&mut file, &mut vec![0; 1024]).await?;
        seek_line_backwards(&mut file, &mut vec![0; 1024]).await?;

        assert_eq!(file.stream_position().await?, 0);
        let rest = rest_of_file(&mut file).await?;
        assert_eq!(rest, RECORDS);
        Ok(())
    }

    #[tokio::test]
    async fn empty_file_stays_at_start() -> Result<()> {
        let mut file = file_with("").await?;

        seek_line_backwards(&mut file, &mut vec![0; 1024]).await?;

        assert_eq!(file.stream_position().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn torn_trailing_record_is_the_last_line() -> Result<()> {
        // A shutdown mid-write leaves a record without its newline. The
        // cursor must land at the start of that fragment.
        let torn = "{\"start\":1741338180,\"dur";
        let mut file = file_with(&format!("{RECORDS}{torn}")).await?;

        seek_line_backwards(&mut file, &mut vec![0; 1024]).await?;

        let rest = rest_of_file(&mut file).await?;
        assert_eq!(rest, torn);
        Ok(())
    }

    #[tokio::test]
    async fn buffer_smaller_than_a_record_still_finds_the_line() -> Result<()> {
        let mut file = file_with(RECORDS).await?;

        // Forces the scan to cross chunk boundaries.
        seek_line_backwards(&mut file, &mut vec![0; 4]).await?;

        let rest = rest_of_file(&mut file).await?;
        assert_eq!(rest, "{\"start\":1741338120,\"duration\":0,\"active\":false}\n");
        Ok(())
    }
}
