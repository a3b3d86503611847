//! The `pm` capability object
//!
//! Installs `__pm_run(source, mode)`, which compiles the user script into a
//! function of `(pm, response, environments)`, runs it and returns a JSON
//! report `{ ok, value, error, results }`. Variable reads and writes go
//! through the native `__pm_env_get` / `__pm_env_set` bridge.

use rquickjs::Ctx;

use crate::errors::OpenRequestError;

const PM_JS: &str = r#"
(function (global) {
  // User code shares this global scope and may reassign these
  const stringify = JSON.stringify;
  const parse = JSON.parse;
  const ErrorType = Error;
  const makeFunction = Function;
  const asString = String;

  const input = parse(global.__pm_input);
  const envGet = global.__pm_env_get;
  const envSet = global.__pm_env_set;
  const response = input.response === null ? undefined : input.response;

  const variables = {
    get: function (key) {
      const value = envGet(asString(key));
      return value === null ? undefined : value;
    },
    set: function (key, value, environmentName) {
      if (environmentName === undefined || environmentName === null) {
        envSet(asString(key), asString(value));
      } else {
        envSet(asString(key), asString(value), asString(environmentName));
      }
    },
  };

  function failMessage(error, fallback) {
    return error instanceof ErrorType ? error.message : fallback;
  }

  function checkStatus(expected) {
    const status = response ? response.status : undefined;
    if (status !== expected) {
      throw new ErrorType("Expected status " + expected + " but got " + status);
    }
  }

  function makeTest(mode, results) {
    return function (name, fn) {
      let result;
      try {
        fn();
        result = { name: asString(name), passed: true };
      } catch (error) {
        result = { name: asString(name), passed: false, error: failMessage(error, "Test failed") };
      }
      if (mode === "tests") {
        results.push(result);
        return undefined;
      }
      return result;
    };
  }

  function makeExpect(mode) {
    return function (actual) {
      const be = {};
      Object.defineProperty(be, "ok", {
        get: function () {
          const status = response ? response.status : undefined;
          if (!response || status < 200 || status >= 300) {
            throw new ErrorType("Expected response to be ok but got status " + status);
          }
          return function () {};
        },
      });

      return {
        to: {
          equal: function (expected) {
            if (actual !== expected) {
              throw new ErrorType("Expected " + expected + " but got " + actual);
            }
          },
          have: {
            status: checkStatus,
            property: function (prop) {
              const data = response ? response.data : undefined;
              if (data === null || typeof data !== "object" || !(prop in data)) {
                throw new ErrorType("Expected response to have property '" + prop + "'");
              }
              if (mode !== "tests") {
                return undefined;
              }
              return {
                that: {
                  equals: function (expected) {
                    if (data[prop] !== expected) {
                      throw new ErrorType(
                        "Expected property '" + prop + "' to equal " + expected +
                        " but got " + data[prop]
                      );
                    }
                  },
                },
              };
            },
          },
          be: be,
        },
      };
    };
  }

  function makeResponse(mode) {
    if (!response && mode !== "tests") {
      return undefined;
    }
    const resp = response || {};
    const pmResponse = {
      status: resp.status,
      statusText: resp.statusText,
      headers: resp.headers,
      data: resp.data,
      responseTime: resp.time,
      json: function () {
        return resp.data;
      },
      text: function () {
        return typeof resp.data === "string" ? resp.data : stringify(resp.data);
      },
    };
    if (mode === "tests") {
      pmResponse.to = {
        have: {
          status: checkStatus,
          jsonBody: function () {
            const contentType = (resp.headers && resp.headers["content-type"]) || "";
            if (contentType.indexOf("application/json") === -1) {
              throw new ErrorType("Expected response to have JSON body");
            }
          },
        },
      };
    }
    return pmResponse;
  }

  function toJson(value) {
    try {
      return parse(stringify(value));
    } catch (error) {
      return null;
    }
  }

  global.__pm_run = function (source, mode) {
    const results = [];
    const pm = {
      test: makeTest(mode, results),
      expect: makeExpect(mode),
      response: makeResponse(mode),
      request: input.request,
      environment: variables,
      globals: variables,
    };
    try {
      const fn = new makeFunction("pm", "response", "environments", source);
      const value = fn(pm, response, input.environments);
      return stringify({ ok: true, value: toJson(value), results: results });
    } catch (error) {
      const fallback = mode === "tests" ? "Test script execution failed" : "Script execution failed";
      return stringify({ ok: false, error: failMessage(error, fallback), results: results });
    }
  };
})(globalThis);
"#;

pub fn register(ctx: &Ctx<'_>) -> Result<(), OpenRequestError> {
    ctx.eval::<(), _>(PM_JS)
        .map_err(|e| OpenRequestError::Script(format!("Failed to install pm: {}", e)))
}
