// Copyright Rouven Bauer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;

use super::{PackStreamDeserialize, PackStreamSerialize, PackStreamSerializer};
use crate::{ValueReceive, ValueSend};

impl PackStreamSerialize for ValueSend {
    fn serialize<S: PackStreamSerializer>(&self, serializer: &mut S) -> Result<(), S::Error> {
        (&self).serialize(serializer)
    }
}

impl PackStreamSerialize for &ValueSend {
    fn serialize<S: PackStreamSerializer>(&self, serializer: &mut S) -> Result<(), S::Error> {
        match self {
            ValueSend::Null => serializer.write_null(),
            ValueSend::Boolean(v) => serializer.write_bool(*v),
            ValueSend::Integer(v) => serializer.write_int(*v),
            ValueSend::Float(v) => serializer.write_float(*v),
            ValueSend::Bytes(v) => serializer.write_bytes(v),
            ValueSend::String(v) => serializer.write_string(v),
            ValueSend::List(v) => serializer.write_list(v),
            ValueSend::Map(v) => serializer.write_dict(v),
        }
    }
}

impl PackStreamDeserialize for ValueReceive {
    type Value = ValueReceive;

    fn load_null() -> Self::Value {
        ValueReceive::Null
    }

    fn load_bool(b: bool) -> Self::Value {
        ValueReceive::Boolean(b)
    }

    fn load_int(i: i64) -> Self::Value {
        ValueReceive::Integer(i)
    }

    fn load_float(f: f64) -> Self::Value {
        ValueReceive::Float(f)
    }

    fn load_bytes(b: Vec<u8>) -> Self::Value {
        ValueReceive::Bytes(b)
    }

    fn load_string(s: String) -> Self::Value {
        ValueReceive::String(s)
    }

    fn load_list(l: Vec<Self::Value>) -> Self::Value {
        ValueReceive::List(l)
    }

    fn load_dict(d: HashMap<String, Self::Value>) -> Self::Value {
        ValueReceive::Map(d)
    }

    fn load_broken(reason: String) -> Self::Value {
        ValueReceive::BrokenValue { reason }
    }
}
