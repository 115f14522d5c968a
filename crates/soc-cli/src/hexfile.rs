//! Hex listings for programs and memory images.
//!
//! Both formats are whitespace-separated hex words with an optional `0x`
//! prefix; `#` or `;` starts a comment running to the end of the line. Memory
//! images additionally use `@address` markers to start a new segment at an
//! even byte address.

use std::fs;
use std::path::Path;

use soc_core::{MemoryImage, Program};

use crate::errors::{LoadError, SyntaxErrorKind};

enum Token<'a> {
    Address(&'a str),
    Word(&'a str),
}

fn tokens(text: &str) -> impl Iterator<Item = (usize, Token<'_>)> {
    text.lines().enumerate().flat_map(|(index, line)| {
        let code = line.split(['#', ';']).next().unwrap_or_default();
        code.split_whitespace().map(move |token| {
            let token = token
                .strip_prefix('@')
                .map_or(Token::Word(token), Token::Address);
            (index + 1, token)
        })
    })
}

fn strip_radix(token: &str) -> &str {
    token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token)
}

fn parse_word(line: usize, token: &str) -> Result<u16, LoadError> {
    let digits = strip_radix(token);
    let value = u32::from_str_radix(digits, 16).map_err(|_| {
        LoadError::syntax(line, SyntaxErrorKind::InvalidToken(token.to_string()))
    })?;
    u16::try_from(value)
        .map_err(|_| LoadError::syntax(line, SyntaxErrorKind::WordOutOfRange(token.to_string())))
}

fn parse_address(line: usize, token: &str) -> Result<u32, LoadError> {
    let address = u32::from_str_radix(strip_radix(token), 16).map_err(|_| {
        LoadError::syntax(line, SyntaxErrorKind::InvalidToken(format!("@{token}")))
    })?;
    if address & 1 != 0 {
        return Err(LoadError::syntax(
            line,
            SyntaxErrorKind::UnalignedAddress(address),
        ));
    }
    Ok(address)
}

/// Parses a program listing: one instruction word per token.
///
/// # Errors
///
/// Returns [`LoadError::Syntax`] for malformed tokens or address markers.
pub fn parse_program(text: &str) -> Result<Program, LoadError> {
    let mut words = Vec::new();
    for (line, token) in tokens(text) {
        match token {
            Token::Word(token) => words.push(parse_word(line, token)?),
            Token::Address(_) => {
                return Err(LoadError::syntax(line, SyntaxErrorKind::UnexpectedAddress))
            }
        }
    }
    Ok(Program::new(words))
}

/// Parses a memory image listing into segments.
///
/// # Errors
///
/// Returns [`LoadError::Syntax`] for malformed tokens, odd addresses or data
/// before the first address marker.
pub fn parse_image(text: &str) -> Result<MemoryImage, LoadError> {
    let mut segments: Vec<(u32, Vec<u16>)> = Vec::new();
    for (line, token) in tokens(text) {
        match token {
            Token::Address(token) => segments.push((parse_address(line, token)?, Vec::new())),
            Token::Word(token) => {
                let word = parse_word(line, token)?;
                let (_, words) = segments
                    .last_mut()
                    .ok_or_else(|| LoadError::syntax(line, SyntaxErrorKind::MissingAddress))?;
                words.push(word);
            }
        }
    }
    Ok(segments
        .into_iter()
        .filter(|(_, words)| !words.is_empty())
        .fold(MemoryImage::new(), |image, (address, words)| {
            image.with_segment(address, words)
        }))
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and parses a program listing.
///
/// # Errors
///
/// Returns [`LoadError::Io`] when the file cannot be read, otherwise as
/// [`parse_program`].
pub fn load_program(path: &Path) -> Result<Program, LoadError> {
    let program = parse_program(&read(path)?).map_err(|error| error.in_file(path))?;
    log::debug!("loaded {} program words from {}", program.len(), path.display());
    Ok(program)
}

/// Reads and parses a memory image listing.
///
/// # Errors
///
/// Returns [`LoadError::Io`] when the file cannot be read, otherwise as
/// [`parse_image`].
pub fn load_image(path: &Path) -> Result<MemoryImage, LoadError> {
    let image = parse_image(&read(path)?).map_err(|error| error.in_file(path))?;
    log::debug!(
        "loaded {} image segments from {}",
        image.segments().len(),
        path.display()
    );
    Ok(image)
}
