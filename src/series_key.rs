use crate::{validate, Cf};
use std::fmt::Write;

/// Joins key segments with the field delimiter, validating each one.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidKey`] if any segment is not a valid key.
pub fn encode<S: AsRef<str>>(segments: &[S]) -> crate::Result<String> {
    let total_len = segments
        .iter()
        .map(|s| s.as_ref().len())
        .sum::<usize>()
        + segments.len().saturating_sub(1);

    let mut buf = String::with_capacity(total_len);

    for (idx, segment) in segments.iter().enumerate() {
        let segment = validate::key(segment.as_ref(), crate::Error::from)?;

        if idx > 0 {
            buf.push(validate::DELIMITER);
        }
        buf.push_str(segment);
    }

    Ok(buf)
}

/// Splits an encoded key back into its segments.
#[must_use]
pub fn decode(key: &str) -> Vec<&str> {
    key.split(validate::DELIMITER).collect()
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn percent_encode(buf: &mut String, segment: &str) {
    for b in segment.bytes() {
        if is_unreserved(b) {
            buf.push(char::from(b));
        } else {
            // NOTE: Writing to a String cannot fail
            let _ = write!(buf, "%{b:02X}");
        }
    }
}

fn percent_decode(segment: &str) -> crate::Result<String> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;

    while let Some(&b) = bytes.get(idx) {
        if b == b'%' {
            let hex = bytes
                .get(idx + 1..idx + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| crate::Error::InvalidKey(format!("bad escape in {segment:?}")))?;
            out.push(hex);
            idx += 3;
        } else {
            out.push(b);
            idx += 1;
        }
    }

    String::from_utf8(out).map_err(|_| crate::Error::InvalidKey(format!("{segment:?} is not utf-8")))
}

/// Identity of one time series: subject, attribute and consolidation function.
///
/// The same subject and attribute may exist under several consolidation
/// functions; those are independent series.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    subject: String,
    attribute: String,
    cf: Cf,
}

impl SeriesKey {
    /// Creates a series identity, validating subject and attribute.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidKey`] if a component is not a valid key.
    pub fn new(subject: &str, attribute: &str, cf: Cf) -> crate::Result<Self> {
        let subject = validate::key(subject, crate::Error::from)?;
        let attribute = validate::key(attribute, crate::Error::from)?;

        Ok(Self {
            subject: subject.to_owned(),
            attribute: attribute.to_owned(),
            cf,
        })
    }

    /// Creates a series identity from three untrusted strings.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidKey`] if a component is not a valid key
    /// or the consolidation function is unknown.
    pub fn parse(subject: &str, attribute: &str, cf: &str) -> crate::Result<Self> {
        let cf = validate::key(cf, crate::Error::from)?.parse()?;
        Self::new(subject, attribute, cf)
    }

    /// Subject, e.g. a host name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Attribute of the subject, e.g. `load`.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Consolidation function the series is bound to.
    #[must_use]
    pub fn cf(&self) -> Cf {
        self.cf
    }

    /// Encodes the identity under `namespace`, followed by `suffix` segments.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidKey`] if the namespace or a suffix
    /// segment is not a valid key.
    pub fn encode(&self, namespace: &str, suffix: &[&str]) -> crate::Result<String> {
        let mut segments = Vec::with_capacity(4 + suffix.len());
        segments.push(namespace);
        segments.push(&self.subject);
        segments.push(&self.attribute);
        segments.push(self.cf.as_str());
        segments.extend_from_slice(suffix);

        encode(&segments)
    }

    /// Decodes an identity that was encoded under `namespace` without suffix.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidKey`] if the key does not have that shape.
    pub fn decode(namespace: &str, key: &str) -> crate::Result<Self> {
        match decode(key).as_slice() {
            [ns, subject, attribute, cf] if *ns == namespace => {
                Self::parse(subject, attribute, cf)
            }
            _ => Err(crate::Error::InvalidKey(format!(
                "{key:?} is not a series key in namespace {namespace:?}"
            ))),
        }
    }

    /// Formats the collaborator-facing `<subject>/<attribute>/<cf>` form.
    #[must_use]
    pub fn to_wire(&self) -> String {
        let mut s = String::with_capacity(self.subject.len() + self.attribute.len() + 16);
        percent_encode(&mut s, &self.subject);
        s.push(validate::PATH_SEPARATOR);
        percent_encode(&mut s, &self.attribute);
        s.push(validate::PATH_SEPARATOR);
        s.push_str(self.cf.as_str());
        s
    }

    /// Parses the `<subject>/<attribute>/<cf>` form.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidKey`] if the path does not have three
    /// valid segments.
    pub fn from_wire(path: &str) -> crate::Result<Self> {
        let segments = path
            .trim_matches(validate::PATH_SEPARATOR)
            .split(validate::PATH_SEPARATOR)
            .map(percent_decode)
            .collect::<crate::Result<Vec<_>>>()?;

        match segments.as_slice() {
            [subject, attribute, cf] => Self::parse(subject, attribute, cf),
            _ => Err(crate::Error::InvalidKey(format!(
                "{path:?} is not <subject>/<attribute>/<cf>"
            ))),
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}
