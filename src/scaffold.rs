//! Fixed configuration and scaffold files of an exported project.

use crate::config::BuilderConfig;

const VITE_CONFIG: &str = r#"import { defineConfig } from 'vite';
import react from '@vitejs/plugin-react';

export default defineConfig({
  plugins: [react()],
});
"#;

const TAILWIND_CONFIG: &str = r#"/** @type {import('tailwindcss').Config} */
export default {
  content: ['./index.html', './src/**/*.{js,jsx}'],
  theme: {
    extend: {},
  },
  plugins: [],
};
"#;

const POSTCSS_CONFIG: &str = r#"export default {
  plugins: {
    tailwindcss: {},
    autoprefixer: {},
  },
};
"#;

const GITIGNORE: &str = "node_modules\ndist\n.DS_Store\n*.log\n";

const INDEX_CSS: &str = "@tailwind base;\n@tailwind components;\n@tailwind utilities;\n";

const MAIN_JSX: &str = r#"import React from 'react';
import ReactDOM from 'react-dom/client';
import App from './App';
import './index.css';

ReactDOM.createRoot(document.getElementById('root')).render(
  <React.StrictMode>
    <App />
  </React.StrictMode>
);
"#;

/// Implementations of the well-known atoms; `None` means a generic container.
fn atom_body(name: &str) -> Option<&'static str> {
    let body = match name {
        "Box" => "({ as: Tag = 'div', className = '', children, ...rest }) {\n  return <Tag className={className} {...rest}>{children}</Tag>;\n}",
        "Stack" => "({ direction = 'column', gap = 4, className = '', children, ...rest }) {\n  const axis = direction === 'row' ? 'flex-row' : 'flex-col';\n  return <div className={`flex ${axis} gap-${gap} ${className}`} {...rest}>{children}</div>;\n}",
        "Text" => "({ as: Tag = 'p', className = '', children, ...rest }) {\n  return <Tag className={className} {...rest}>{children}</Tag>;\n}",
        "Heading" => "({ level = 2, className = '', children, ...rest }) {\n  const Tag = `h${Math.min(Math.max(level, 1), 6)}`;\n  return <Tag className={`font-semibold ${className}`} {...rest}>{children}</Tag>;\n}",
        "Button" => "({ variant = 'primary', className = '', children, ...rest }) {\n  const look = variant === 'primary' ? 'bg-black text-white' : 'border border-gray-300';\n  return <button className={`rounded-md px-4 py-2 ${look} ${className}`} {...rest}>{children}</button>;\n}",
        "Image" => "({ alt = '', className = '', ...rest }) {\n  return <img alt={alt} className={className} {...rest} />;\n}",
        "Link" => "({ href = '#', className = '', children, ...rest }) {\n  return <a href={href} className={`underline-offset-4 hover:underline ${className}`} {...rest}>{children}</a>;\n}",
        "Icon" => "({ name, className = '', ...rest }) {\n  return <span aria-hidden=\"true\" data-icon={name} className={className} {...rest} />;\n}",
        "Badge" => "({ className = '', children, ...rest }) {\n  return <span className={`rounded-full bg-gray-100 px-2 py-0.5 text-xs ${className}`} {...rest}>{children}</span>;\n}",
        "Input" => "({ className = '', ...rest }) {\n  return <input className={`rounded-md border px-3 py-2 ${className}`} {...rest} />;\n}",
        _ => return None,
    };
    Some(body)
}

/// Module exporting one implementation per configured atom.
pub fn primitives_module(atoms: &[String]) -> String {
    let mut out = String::new();
    for atom in atoms {
        match atom_body(atom) {
            Some(body) => out.push_str(&format!("export function {}{}\n\n", atom, body)),
            None => out.push_str(&format!(
                "export function {}({{ className = '', children, ...rest }}) {{\n  return <div className={{className}} {{...rest}}>{{children}}</div>;\n}}\n\n",
                atom
            )),
        }
    }
    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

fn index_html(title: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>{}</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.jsx"></script>
  </body>
</html>
"#,
        title
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    )
}

/// Project-relative path of a module given as `relative` from `base_dir`.
pub fn join_module_path(base_dir: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Every file an export carries regardless of the document contents.
pub fn scaffold_files(config: &BuilderConfig) -> Vec<(String, String)> {
    let primitives_path = format!(
        "{}.jsx",
        join_module_path(&config.project.generated_dir, &config.capabilities.atoms_module)
    );
    vec![
        ("index.html".to_string(), index_html(&config.project.name)),
        ("vite.config.js".to_string(), VITE_CONFIG.to_string()),
        ("tailwind.config.js".to_string(), TAILWIND_CONFIG.to_string()),
        ("postcss.config.js".to_string(), POSTCSS_CONFIG.to_string()),
        (".gitignore".to_string(), GITIGNORE.to_string()),
        ("src/main.jsx".to_string(), MAIN_JSX.to_string()),
        ("src/index.css".to_string(), INDEX_CSS.to_string()),
        (primitives_path, primitives_module(&config.capabilities.atoms)),
    ]
}
