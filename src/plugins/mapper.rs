use crate::io::files::base_name;
use crate::stage::{Stage, StageBox, StageContext};
use crate::types::{DirectoryContents, LineRecords, MapRecord, MapperOutput};
use anyhow::{Result, anyhow, bail};
use regex::Regex;

/// Splits every line into lower-cased word tokens.
///
/// For each source file (keyed by its base name) and each of its lines, one
/// [`MapRecord`] is emitted per token with its 1-based position in the line
/// and a count of one. A line's records are grouped in chunks of at most
/// `map_buffer_size`.
pub struct WordMapper {
    input: Option<DirectoryContents>,
    buffer_size: usize,
    word: Regex,
    output: Option<MapperOutput>,
}

impl WordMapper {
    /// # Errors
    /// Only if the token pattern fails to compile.
    pub fn new(input: DirectoryContents, buffer_size: usize) -> Result<Self> {
        Ok(Self {
            input: Some(input),
            buffer_size: buffer_size.max(1),
            word: Regex::new(r"\w+")?,
            output: None,
        })
    }

    /// Create factory for the mapper module.
    ///
    /// # Errors
    /// As [`WordMapper::new`].
    pub fn create(input: DirectoryContents, ctx: &StageContext) -> Result<StageBox<MapperOutput>> {
        Ok(Box::new(Self::new(input, ctx.map_buffer_size())?))
    }

    fn map_line(&self, line: &str) -> LineRecords {
        let records: Vec<MapRecord> = self
            .word
            .find_iter(line)
            .enumerate()
            .map(|(i, m)| MapRecord::new(m.as_str().to_lowercase(), i as u64 + 1, 1))
            .collect();
        records
            .chunks(self.buffer_size)
            .map(<[MapRecord]>::to_vec)
            .collect()
    }
}

impl Stage for WordMapper {
    type Output = MapperOutput;

    fn run(&mut self) -> Result<()> {
        let input = self
            .input
            .take()
            .ok_or_else(|| anyhow!("mapper input already consumed"))?;
        let mut output = MapperOutput::new();
        for (path, text) in &input {
            let key = base_name(path)
                .ok_or_else(|| anyhow!("input path has no file name: {}", path.display()))?;
            let lines: Vec<LineRecords> = text.lines().map(|l| self.map_line(l)).collect();
            if output.insert(key.clone(), lines).is_some() {
                bail!("two input files share the name {key}");
            }
        }
        self.output = Some(output);
        Ok(())
    }

    fn take_output(&mut self) -> Option<MapperOutput> {
        self.output.take()
    }
}
