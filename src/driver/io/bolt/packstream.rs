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

//! The external value codec the wire core depends on: a packer exposing `pack_struct` (built
//! from [`PackStreamSerializer::write_struct`]) and an unpacker exposing
//! `unpack_structure_header`/`unpack`/`unpack_map` (built from [`PackStreamDeserializer::load`]
//! and [`PackStreamDeserializerImpl::read_structure_header`]). Scoped to the value shapes the
//! core's own messages need; it carries no knowledge of any Neo4j value/graph/spatial/temporal
//! struct tag.

mod deserialize;
mod error;
mod serialize;
mod value;

pub(crate) use deserialize::{PackStreamDeserialize, PackStreamDeserializer};
pub(crate) use error::{PackStreamDeserializeError, PackStreamSerializeError};
pub(crate) use serialize::{PackStreamSerialize, PackStreamSerializer};

pub(crate) use deserialize::PackStreamDeserializerImpl;
pub(crate) use serialize::PackStreamSerializerImpl;
