use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionId {
    Header,
    Quests,
    Waypoints,
    NpcIntro,
    Attributes,
    Skills,
    Items,
    Tail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionLayout {
    pub id: SectionId,
    pub range: ByteRange,
}

#[derive(Debug, Clone)]
pub struct FileLayout {
    pub file_len: usize,
    pub sections: Vec<SectionLayout>,
}

impl FileLayout {
    pub fn section(&self, id: SectionId) -> Option<&SectionLayout> {
        self.sections.iter().find(|section| section.id == id)
    }

    pub fn validate(&self) -> io::Result<()> {
        let Some(first) = self.sections.first() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "file layout must contain at least one section",
            ));
        };

        if first.range.start != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "layout does not start at byte 0",
            ));
        }

        let mut expected = 0usize;
        for section in &self.sections {
            if section.range.start != expected {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "layout gap/overlap around section {:?}: expected start {}, got {}",
                        section.id, expected, section.range.start
                    ),
                ));
            }
            if section.range.end < section.range.start {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "invalid section range {:?}: {}..{}",
                        section.id, section.range.start, section.range.end
                    ),
                ));
            }
            expected = section.range.end;
        }

        if expected != self.file_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "layout does not cover file: ended at {}, file length {}",
                    expected, self.file_len
                ),
            ));
        }

        Ok(())
    }

    /// Resize one section and shift every later section by the difference.
    pub fn resize_section(&mut self, index: usize, new_len: usize) -> io::Result<()> {
        let section = self.sections.get_mut(index).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("no section at index {index}"),
            )
        })?;
        let old_len = section.range.len();
        section.range.end = section.range.start + new_len;

        if new_len == old_len {
            return Ok(());
        }

        if new_len > old_len {
            let delta = new_len - old_len;
            for later in self.sections.iter_mut().skip(index + 1) {
                later.range.start += delta;
                later.range.end += delta;
            }
            self.file_len += delta;
        } else {
            let delta = old_len - new_len;
            for later in self.sections.iter_mut().skip(index + 1) {
                later.range.start = later.range.start.checked_sub(delta).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, "section start underflow")
                })?;
                later.range.end = later.range.end.checked_sub(delta).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, "section end underflow")
                })?;
            }
            self.file_len = self.file_len.checked_sub(delta).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, "layout file_len underflow")
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ByteRange, FileLayout, SectionId, SectionLayout};

    fn layout() -> FileLayout {
        FileLayout {
            file_len: 30,
            sections: vec![
                SectionLayout {
                    id: SectionId::Header,
                    range: ByteRange { start: 0, end: 10 },
                },
                SectionLayout {
                    id: SectionId::Attributes,
                    range: ByteRange { start: 10, end: 20 },
                },
                SectionLayout {
                    id: SectionId::Tail,
                    range: ByteRange { start: 20, end: 30 },
                },
            ],
        }
    }

    #[test]
    fn contiguous_layout_validates() {
        assert!(layout().validate().is_ok());
    }

    #[test]
    fn gap_is_rejected() {
        let mut l = layout();
        l.sections[1].range.start = 11;
        assert!(l.validate().is_err());
    }

    #[test]
    fn resize_shifts_later_sections() {
        let mut l = layout();
        l.resize_section(1, 14).unwrap();
        assert_eq!(l.sections[2].range, ByteRange { start: 24, end: 34 });
        assert_eq!(l.file_len, 34);
        l.validate().unwrap();

        l.resize_section(1, 3).unwrap();
        assert_eq!(l.sections[2].range, ByteRange { start: 13, end: 23 });
        assert_eq!(l.file_len, 23);
        l.validate().unwrap();
    }
}
