/// One enrolled identity: a subject and their stored face embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub subject_id: i64,
    pub embedding: Vec<f64>,
}

/// Read-only candidate set a probe embedding is matched against.
///
/// Scoping is the caller's job: pass all registered identities for a
/// login-style match, or only the members of one roster for attendance.
/// Iteration order is the insertion order and is what breaks exact
/// distance ties in the matcher.
#[derive(Debug, Clone, Default)]
pub struct IdentityGallery {
    entries: Vec<GalleryEntry>,
}

impl IdentityGallery {
    pub fn new(entries: Vec<GalleryEntry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, subject_id: i64, embedding: Vec<f64>) {
        self.entries.push(GalleryEntry {
            subject_id,
            embedding,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GalleryEntry> {
        self.entries.iter()
    }
}

impl FromIterator<(i64, Vec<f64>)> for IdentityGallery {
    fn from_iter<T: IntoIterator<Item = (i64, Vec<f64>)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(subject_id, embedding)| GalleryEntry {
                    subject_id,
                    embedding,
                })
                .collect(),
        }
    }
}
