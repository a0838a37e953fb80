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

use std::sync::Arc;
use std::time::Duration;

use bolt_client::address::Address;
use bolt_client::driver::{AuthToken, ConnectionConfig, ConnectionPool, PoolConfig};
use bolt_client::value;

const HOST: &str = "localhost";
const PORT: u16 = 7687;
const USER: &str = "neo4j";
const PASSWORD: &str = "pass";

fn main() {
    let address = Address::from((HOST, PORT));
    let auth = Arc::new(AuthToken::new_basic_auth(USER, PASSWORD));
    let connection_config = ConnectionConfig::new(address).with_auth(auth);
    let pool_config = PoolConfig::new().with_max_connection_pool_size(16);
    let pool = ConnectionPool::new(connection_config, pool_config);

    let mut connection = pool.acquire(Duration::from_secs(5)).unwrap();
    connection
        .run(
            "RETURN $x AS x",
            Some(&value!({"x": 123})),
            Default::default(),
        )
        .unwrap();
    connection.pull_all(Default::default()).unwrap();
    connection.send_all().unwrap();
    let (records, summaries) = connection.fetch_all().unwrap();
    println!("received {records} record(s), {summaries} summary message(s)");
}
