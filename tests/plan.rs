use std::any::Any;

use pretty_assertions::assert_eq;
use rowbind::{
    BoxError,
    avec::{Options, Record, reader::Error},
    sans::{
        Decoder,
        bind::{BindError, Decoding, Method, Routine},
        field::FieldDescriptor,
        header::HeaderMap,
        plan::{DecoderPlan, PlanError},
    },
};

/// A record naming a decoder it does not provide.
#[derive(Debug, Default)]
struct Unbound {
    age: u32,
}

impl Record for Unbound {
    fn fields() -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::unquoted::<u32>("age", "Age,decode_age")]
    }

    fn field_mut(&mut self, location: &[usize]) -> Option<&mut dyn Any> {
        match location {
            [0] => Some(&mut self.age),
            _ => None,
        }
    }
}

/// A record whose decoder writes a different type than its field.
#[derive(Debug, Default)]
struct Mismatched {
    age: u32,
}

impl Mismatched {
    fn decode_age(age: &mut i64, raw: &[u8]) -> Result<(), BoxError> {
        *age = std::str::from_utf8(raw)?.parse()?;
        Ok(())
    }
}

impl Record for Mismatched {
    fn fields() -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::unquoted::<u32>("age", "Age,decode_age")]
    }

    fn field_mut(&mut self, location: &[usize]) -> Option<&mut dyn Any> {
        match location {
            [0] => Some(&mut self.age),
            _ => None,
        }
    }

    fn decoder(name: &str) -> Option<Method> {
        match name {
            "decode_age" => Some(Method::new(Self::decode_age)),
            _ => None,
        }
    }
}

/// A record with a field that has neither a default routine nor a decoder.
#[derive(Debug, Default)]
struct Opaque {
    handle: Handle,
}

#[derive(Debug, Default)]
struct Handle;

impl Record for Opaque {
    fn fields() -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::custom::<Handle>("handle", "Handle")]
    }

    fn field_mut(&mut self, location: &[usize]) -> Option<&mut dyn Any> {
        match location {
            [0] => Some(&mut self.handle),
            _ => None,
        }
    }
}

/// A record with a mix of routines, and one field the accessor cannot reach.
#[derive(Debug, Default)]
struct Mixed {
    name: String,
    level: u8,
}

impl Mixed {
    fn decode_level(level: &mut u8, raw: &[u8]) -> Result<(), BoxError> {
        *level = u8::try_from(raw.len())?;
        Ok(())
    }
}

impl Record for Mixed {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::quoted::<String>("name", "Name"),
            FieldDescriptor::parsed::<u8>("level", "Level,decode_level"),
            FieldDescriptor::unquoted::<u8>("hidden", "Hidden"),
        ]
    }

    fn field_mut(&mut self, location: &[usize]) -> Option<&mut dyn Any> {
        match location {
            [0] => Some(&mut self.name),
            [1] => Some(&mut self.level),
            _ => None,
        }
    }

    fn decoder(name: &str) -> Option<Method> {
        match name {
            "decode_level" => Some(Method::new(Self::decode_level)),
            _ => None,
        }
    }
}

#[test]
fn missing_decoder_method_fails_bind() {
    let result: Result<Vec<Unbound>, _> =
        rowbind::avec::decode_slice(b"Age\n12\n", &Options::default());

    let Err(Error::Bind { field, source }) = result else {
        panic!("unexpected result: {result:?}");
    };
    assert_eq!(field, "age");
    assert!(matches!(source, BindError::MissingMethod(name) if name == "decode_age"));
}

#[test]
fn missing_decoder_is_not_checked_without_column() {
    let records: Vec<Unbound> =
        rowbind::avec::decode_slice(b"Name\nBob\n", &Options::default()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].age, 0);
}

#[test]
fn mismatched_decoder_fails_bind() {
    let err = DecoderPlan::<Mismatched>::build(&HeaderMap::from_names(["Age"])).unwrap_err();

    let PlanError::Bind {
        source: BindError::Signature {
            name,
            expected,
            found,
        },
        ..
    } = err
    else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(name, "decode_age");
    assert_eq!(expected, "u32");
    assert_eq!(found, "i64");
}

#[test]
fn field_without_default_needs_decoder() {
    let err = DecoderPlan::<Opaque>::build(&HeaderMap::from_names(["Handle"])).unwrap_err();
    assert!(matches!(
        err,
        PlanError::Bind {
            source: BindError::NoDefault(_),
            ..
        }
    ));
}

#[test]
fn plan_entries_follow_declaration_order() {
    let plan = DecoderPlan::<Mixed>::build(&HeaderMap::from_names(["Level", "Extra", "Name"]))
        .unwrap();

    let entries: Vec<(usize, &str)> = plan
        .entries()
        .iter()
        .map(|entry| (entry.column, entry.field.as_str()))
        .collect();
    assert_eq!(entries, [(2, "name"), (0, "level")]);
    assert_eq!(plan.last_column(), 2);

    assert!(matches!(
        plan.entries()[0].routine,
        Routine::Default(Decoding::Quoted, _)
    ));
    assert!(matches!(&plan.entries()[1].routine, Routine::Custom(name, _) if name == "decode_level"));

    let record = plan.decode_new(&["four", "", "Bob"][..]).unwrap();
    assert_eq!(record.name, "Bob");
    assert_eq!(record.level, 4);
}

#[test]
fn unreachable_field_is_decode_error() {
    let plan = DecoderPlan::<Mixed>::build(&HeaderMap::from_names(["Hidden"])).unwrap();
    assert!(plan.decode_new(&["1"][..]).is_err());
}

#[test]
fn decoder_states_drive_rows() {
    let rows = vec![
        vec!["Name", "Level"],
        vec!["Bob", "xy"],
        vec!["Alice", "xyz"],
    ];
    let mut source = VecSource { rows, next: 0 };

    let header = Decoder::default().advance(None, &mut source).unwrap();
    assert_eq!(header.headers().names(), ["Name", "Level"]);

    let mut state = header.advance::<Mixed>().unwrap();
    let mut levels = Vec::new();

    let done = loop {
        let next = source.next_row();
        match state.advance(next).unwrap() {
            either::Either::Left((record, successor)) => {
                levels.push(record.level);
                state = successor;
            }
            either::Either::Right(done) => break done,
        }
    };

    assert_eq!(levels, [2, 3]);
    assert_eq!(done.decoded(), 2);
}

struct VecSource {
    rows: Vec<Vec<&'static str>>,
    next: usize,
}

impl VecSource {
    fn next_row(&mut self) -> Option<&Vec<&'static str>> {
        let row = self.rows.get(self.next);
        self.next += 1;
        row
    }
}

impl rowbind::sans::row::RowSource for VecSource {
    type Row = Vec<&'static str>;
    type Error = std::convert::Infallible;

    fn read_row(&mut self) -> Result<Option<&Self::Row>, Self::Error> {
        Ok(self.next_row())
    }
}
