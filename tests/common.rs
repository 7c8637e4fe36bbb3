use std::{any::Any, fs::File, path::Path};

use csv::ReaderBuilder;
use pretty_assertions::assert_eq;
use rowbind::{
    avec::{Options, Reader, Record},
    sans::field::FieldDescriptor,
};
use serde::Deserialize;

const PATH: &str = "fixtures/people.csv";

#[test]
fn decode_slice_people() {
    let data = std::fs::read(PATH).unwrap();
    let people: Vec<Person> = rowbind::avec::decode_slice(&data, &Options::default()).unwrap();
    assert_eq!(people, expected(PATH));
}

#[test]
fn decode_reader_people() {
    let file = File::open(PATH).unwrap();
    let people: Vec<Person> = rowbind::avec::decode_reader(file, &Options::default()).unwrap();
    assert_eq!(people, expected(PATH));
}

#[test]
fn reader_resolves_header_row() {
    let file = File::open(PATH).unwrap();
    let reader = Reader::new(file, &Options::default()).unwrap();

    let expected: Vec<String> = ReaderBuilder::new()
        .from_path(PATH)
        .unwrap()
        .headers()
        .unwrap()
        .iter()
        .map(str::to_string)
        .collect();

    assert_eq!(reader.headers().names(), expected.as_slice());
    assert_eq!(reader.headers().get("City"), Some(2));
    assert_eq!(reader.headers().get("Country"), None);
}

#[test]
fn partial_record_reads_subset_of_columns() {
    let data = std::fs::read(PATH).unwrap();
    let ages: Vec<Age> = rowbind::avec::decode_slice(&data, &Options::default()).unwrap();

    let expected: Vec<u32> = expected(PATH).into_iter().map(|p| p.age).collect();
    assert_eq!(ages.into_iter().map(|a| a.0).collect::<Vec<_>>(), expected);
}

fn expected(path: impl AsRef<Path>) -> Vec<Person> {
    ReaderBuilder::new()
        .from_path(path)
        .unwrap()
        .deserialize()
        .map(Result::unwrap)
        .collect()
}

/// A record implemented by hand, checked against the `csv` crate's own serde
/// support.
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Person {
    name: String,
    age: u32,
    city: String,
}

impl Record for Person {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::quoted::<String>("name", "Name"),
            FieldDescriptor::unquoted::<u32>("age", "Age,,,required"),
            FieldDescriptor::quoted::<String>("city", "City"),
        ]
    }

    fn field_mut(&mut self, location: &[usize]) -> Option<&mut dyn Any> {
        match location {
            [0] => Some(&mut self.name),
            [1] => Some(&mut self.age),
            [2] => Some(&mut self.city),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Age(u32);

impl Record for Age {
    fn fields() -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::parsed::<u32>("0", "Age")]
    }

    fn field_mut(&mut self, location: &[usize]) -> Option<&mut dyn Any> {
        match location {
            [0] => Some(&mut self.0),
            _ => None,
        }
    }
}
