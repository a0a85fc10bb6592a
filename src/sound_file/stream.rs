use std::io::{self, Read, Seek, SeekFrom};

/// Seekable byte source that decoders read from.
///
/// Implemented for every `Read + Seek + Send` type, so files, in-memory cursors and
/// custom sources all qualify without extra glue.
pub trait InputStream: Read + Seek + Send {
    /// Current read position in bytes.
    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    /// Total size of the stream in bytes. The read position is left unchanged.
    fn size(&mut self) -> io::Result<u64> {
        let current = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        if current != end {
            self.seek(SeekFrom::Start(current))?;
        }
        Ok(end)
    }
}

impl<T: Read + Seek + Send + ?Sized> InputStream for T {}

/// Rewinds `stream` to its first byte, failing if the stream lands anywhere else.
pub(crate) fn rewind_to_start(stream: &mut dyn InputStream) -> io::Result<()> {
    match stream.seek(SeekFrom::Start(0))? {
        0 => Ok(()),
        position => Err(io::Error::new(
            io::ErrorKind::Other,
            format!("stream reported position {} after seeking to start", position),
        )),
    }
}

/// The stream backing an open session.
///
/// Owned streams are dropped with the session; borrowed ones are only released.
pub(crate) enum SessionStream<'a> {
    Owned(Box<dyn InputStream + 'a>),
    Borrowed(&'a mut dyn InputStream),
}

impl<'a> SessionStream<'a> {
    pub fn get(&mut self) -> &mut dyn InputStream {
        match self {
            SessionStream::Owned(stream) => stream.as_mut(),
            SessionStream::Borrowed(stream) => &mut **stream,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, SessionStream::Owned(_))
    }
}
